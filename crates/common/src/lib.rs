//! Shared utilities, configuration, and error handling for Aidline
//!
//! This crate provides common functionality used across the Aidline workspace:
//! - Configuration loaded from the environment
//! - Error types and handling
//! - State machine errors shared by domain state machines
//! - The translation catalog consumed by the conversation engine

pub mod config;
pub mod error;
pub mod i18n;
pub mod state;

pub use config::{Config, LlmProvider};
pub use error::{Error, Result};
pub use i18n::{Catalog, Translator};
pub use state::StateError;
