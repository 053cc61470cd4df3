//! Conversation engine: store, gateway adapter, title generation, orchestration

pub mod gateway;
pub mod orchestrator;
pub mod store;
pub mod titles;
