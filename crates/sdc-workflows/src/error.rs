use sdc_graph::GraphError;
use thiserror::Error;

/// Errors raised while building a correction workflow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// Wiring rejected by the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("PEPOLAR correction needs at least one opposite-phase volume")]
    EmptyFmaps,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
