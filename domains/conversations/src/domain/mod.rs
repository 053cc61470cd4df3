//! Conversations domain layer: entities, send state machine, premium gate, attachments

pub mod attachments;
pub mod entities;
pub mod instructions;
pub mod premium;
pub mod state;
