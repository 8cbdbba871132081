//! Domain errors for the orchestration core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    #[error("Unknown task: {0}")]
    UnknownTask(Uuid),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
