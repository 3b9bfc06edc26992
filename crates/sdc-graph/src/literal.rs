//! Build-time constants bound to input ports.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::port::PortType;

/// A constant attached to an input port when the graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    Text(String),
    Scalar(f64),
}

impl Literal {
    /// Type of each element the literal provides.
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Path(_) | Self::Paths(_) => PortType::Path,
            Self::Text(_) => PortType::Identifier,
            Self::Scalar(_) => PortType::Scalar,
        }
    }

    /// Number of elements for list literals, `None` for single values.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Self::Paths(paths) => Some(paths.len()),
            _ => None,
        }
    }
}

impl From<PathBuf> for Literal {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<PathBuf>> for Literal {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Paths(paths)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}
