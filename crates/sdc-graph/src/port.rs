//! Typed ports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Image,
    Mask,
    Series,
    Field,
    ShiftMap,
    Transform,
    Scalar,
    Identifier,
    Path,
    Table,
    Metadata,
    PeDirection,
    Artifact,
}

impl PortType {
    /// Whether a port of this type can be fed from a `source` port.
    ///
    /// Masks are binary images and images may serve as masks. A displacement
    /// field is a transform. A path identifies the file it names.
    pub fn accepts(self, source: PortType) -> bool {
        use PortType::*;
        self == source
            || matches!(
                (self, source),
                (Image, Mask) | (Mask, Image) | (Transform, Field) | (Identifier, Path)
            )
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Mask => "mask",
            Self::Series => "series",
            Self::Field => "displacement field",
            Self::ShiftMap => "shift map",
            Self::Transform => "transform",
            Self::Scalar => "scalar",
            Self::Identifier => "identifier",
            Self::Path => "path",
            Self::Table => "table",
            Self::Metadata => "metadata",
            Self::PeDirection => "phase-encoding direction",
            Self::Artifact => "artifact",
        };
        f.write_str(name)
    }
}

/// A named input or output of a node.
///
/// Collection ports carry an ordered list: as inputs they accept several
/// edges, gathered in connection order; as outputs they emit a list whose
/// length is only known at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub ty: PortType,
    pub required: bool,
    pub collection: bool,
}

impl PortSpec {
    pub fn required(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            collection: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    /// Mark the port as list-valued.
    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }
}
