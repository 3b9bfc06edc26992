//! Typed computation graphs for distortion-correction pipelines.
//!
//! A [`Workflow`] is a static DAG of [`Node`]s joined by typed edges. Graphs
//! are plain data: they can be serialized for an external engine or run
//! in-process by the reference [`Executor`] against bound [`Capabilities`].

pub mod capability;
pub mod error;
pub mod executor;
pub mod literal;
pub mod node;
pub mod port;
pub mod value;
pub mod workflow;

pub use capability::{Capabilities, RegistrationPreset};
pub use error::{ExecutionError, GraphError};
pub use executor::{Executor, PortValues};
pub use literal::Literal;
pub use node::{FanOut, Node, NodeKind};
pub use port::{PortSpec, PortType};
pub use value::{Report, Value};
pub use workflow::{Edge, Workflow, INPUT_NODE, OUTPUT_NODE};
