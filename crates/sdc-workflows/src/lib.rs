//! Susceptibility distortion correction workflows.
//!
//! Two builders assemble static correction graphs:
//!
//! - [`init_sdc_unwarp_wf`] corrects with a measured fieldmap.
//! - [`init_pepolar_unwarp_wf`] corrects with opposite phase-encoding volumes.
//!
//! Both return an [`sdc_graph::Workflow`] with the same boundary outputs, so
//! callers can pick either and run it with [`sdc_graph::Executor`] or export
//! it for another engine.

pub mod config;
pub mod error;
pub mod fieldmap;
pub mod pepolar;

pub use config::{FieldmapUnwarpConfig, MergeInputs, PepolarUnwarpConfig};
pub use error::{Result, WorkflowError};
pub use fieldmap::init_sdc_unwarp_wf;
pub use pepolar::init_pepolar_unwarp_wf;
