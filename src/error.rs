//! Crate-level error type
//!
//! Each layer keeps its own error enum; this one lets the CLI and the HTTP
//! handlers treat them uniformly.

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::import::ImportError;
use crate::session::SessionError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    NotFound(String),
}

impl CascadeError {
    /// Whether the caller, not the system, is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            CascadeError::Config(ConfigError::InsecureUrl | ConfigError::ShortKey) => true,
            CascadeError::Gateway(GatewayError::Backend(_)) => false,
            CascadeError::Gateway(_) => true,
            CascadeError::Workflow(WorkflowError::Gateway(GatewayError::Backend(_))) => false,
            CascadeError::Workflow(_) => true,
            CascadeError::Session(SessionError::UnknownBusinessKey(_)) => true,
            CascadeError::Import(_) => true,
            CascadeError::NotFound(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CascadeError>;
