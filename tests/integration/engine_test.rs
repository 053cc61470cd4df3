//! End-to-end scenarios for the conversation engine against the mock provider

mod common;
mod conversations;
mod invariants;
mod messages;
mod premium;
