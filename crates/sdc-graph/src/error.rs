//! Error types for graph construction and execution.
//!
//! Construction errors ([`GraphError`]) are raised eagerly while a workflow is
//! being wired. Execution errors wrap them together with capability failures
//! and type problems found while values flow through the graph.

use thiserror::Error;

use crate::port::PortType;
use sdc_core::SdcError;

/// Rejections raised while building or validating a workflow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A node name used twice.
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// A node name that is not part of the workflow.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A port the node does not declare.
    #[error("Node {node} has no {direction} port {port}")]
    UnknownPort {
        node: String,
        port: String,
        direction: &'static str,
    },

    /// Source and destination port types are not compatible.
    #[error("Cannot connect {src} ({src_ty}) to {dst} ({dst_ty})")]
    IncompatiblePorts {
        src: String,
        src_ty: PortType,
        dst: String,
        dst_ty: PortType,
    },

    /// A fan-out iteration field fed by a list of the wrong length.
    #[error("Fan-out width mismatch at {node}.{port}: expected {expected}, got {actual}")]
    FanOutWidthMismatch {
        node: String,
        port: String,
        expected: usize,
        actual: usize,
    },

    /// A fan-out iteration field bound to a literal of the wrong length.
    #[error("Literal width mismatch at {node}.{port}: expected {expected}, got {actual}")]
    LiteralWidthMismatch {
        node: String,
        port: String,
        expected: usize,
        actual: usize,
    },

    /// A list-valued source wired into a single-valued port.
    #[error("Cannot feed list-valued {src} into single-valued {dst}")]
    CardinalityMismatch { src: String, dst: String },

    /// A second source for a port that takes exactly one.
    #[error("Port {node}.{port} is already fed")]
    AlreadyConnected { node: String, port: String },

    /// A required port with no source.
    #[error("Required port {node}.{port} is not fed")]
    Unfed { node: String, port: String },

    /// The edge set contains a cycle through these nodes.
    #[error("Cycle through nodes {0:?}")]
    Cycle(Vec<String>),

    /// Malformed fan-out declaration.
    #[error("Invalid fan-out on {node}: {reason}")]
    InvalidFanOut { node: String, reason: String },
}

/// Result type for graph construction.
pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub fn unknown_input(node: &str, port: &str) -> Self {
        Self::UnknownPort {
            node: node.to_string(),
            port: port.to_string(),
            direction: "input",
        }
    }

    pub fn unknown_output(node: &str, port: &str) -> Self {
        Self::UnknownPort {
            node: node.to_string(),
            port: port.to_string(),
            direction: "output",
        }
    }

    pub fn already_connected(node: &str, port: &str) -> Self {
        Self::AlreadyConnected {
            node: node.to_string(),
            port: port.to_string(),
        }
    }
}

/// Failures while running a workflow.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The workflow itself is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A numeric unit failed.
    #[error("Node {node} failed: {source}")]
    Unit {
        node: String,
        #[source]
        source: SdcError,
    },

    /// A bound capability reported an error.
    #[error("Capability {capability} failed in node {node}: {source}")]
    Capability {
        node: String,
        capability: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The node needs a capability that was not bound.
    #[error("Node {node} needs capability {capability}, which is not bound")]
    MissingCapability { node: String, capability: &'static str },

    /// A workflow input was not supplied by the caller.
    #[error("Missing workflow input: {0}")]
    MissingInput(String),

    /// A port has no value when the node runs.
    #[error("No value for {node}.{port}")]
    MissingValue { node: String, port: String },

    /// A value of the wrong kind reached a port.
    #[error("Port {node}.{port} expects {expected}, got {actual}")]
    UnexpectedValue {
        node: String,
        port: String,
        expected: PortType,
        actual: &'static str,
    },

    /// A fan-out input list whose length differs from the declared width.
    #[error("Fan-out {node}.{port} expects {expected} elements, got {actual}")]
    FanOutLength {
        node: String,
        port: String,
        expected: usize,
        actual: usize,
    },
}

impl ExecutionError {
    pub fn unit(node: &str, source: SdcError) -> Self {
        Self::Unit {
            node: node.to_string(),
            source,
        }
    }

    pub fn capability(node: &str, capability: &'static str, source: anyhow::Error) -> Self {
        Self::Capability {
            node: node.to_string(),
            capability,
            source,
        }
    }

    pub fn missing_capability(node: &str, capability: &'static str) -> Self {
        Self::MissingCapability {
            node: node.to_string(),
            capability,
        }
    }
}
