//! Runtime payloads flowing along edges.

use std::path::PathBuf;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::literal::Literal;
use sdc_core::{
    AcquisitionTable, CompositeTransform, DisplacementField, Image, PhaseEncodingDirection, Series,
    SidecarMetadata, VoxelShiftMap,
};

/// A quality-assurance artifact produced alongside a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub lines: Vec<String>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

/// Value carried by a port at run time. Masks travel as images.
#[derive(Debug, Clone)]
pub enum Value<B: Backend> {
    Image(Image<B, 3>),
    Series(Series<B>),
    Field(DisplacementField<B>),
    ShiftMap(VoxelShiftMap<B>),
    Transform(CompositeTransform<B>),
    Scalar(f64),
    Text(String),
    Path(PathBuf),
    Table(AcquisitionTable),
    Metadata(SidecarMetadata),
    PeDirection(PhaseEncodingDirection),
    Artifact(Report),
    List(Vec<Value<B>>),
}

impl<B: Backend> Value<B> {
    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Series(_) => "series",
            Self::Field(_) => "displacement field",
            Self::ShiftMap(_) => "shift map",
            Self::Transform(_) => "transform",
            Self::Scalar(_) => "scalar",
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::Table(_) => "table",
            Self::Metadata(_) => "metadata",
            Self::PeDirection(_) => "phase-encoding direction",
            Self::Artifact(_) => "artifact",
            Self::List(_) => "list",
        }
    }

    pub fn as_image(&self) -> Option<&Image<B, 3>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&DisplacementField<B>> {
        match self {
            Self::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&Series<B>> {
        match self {
            Self::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value<B>]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Consume into an image. Masks are images too.
    pub fn into_image(self) -> Option<Image<B, 3>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl<B: Backend> From<&Literal> for Value<B> {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Path(path) => Self::Path(path.clone()),
            Literal::Paths(paths) => Self::List(paths.iter().cloned().map(Self::Path).collect()),
            Literal::Text(text) => Self::Text(text.clone()),
            Literal::Scalar(value) => Self::Scalar(*value),
        }
    }
}

impl<B: Backend> From<Image<B, 3>> for Value<B> {
    fn from(image: Image<B, 3>) -> Self {
        Self::Image(image)
    }
}

impl<B: Backend> From<Series<B>> for Value<B> {
    fn from(series: Series<B>) -> Self {
        Self::Series(series)
    }
}

impl<B: Backend> From<DisplacementField<B>> for Value<B> {
    fn from(field: DisplacementField<B>) -> Self {
        Self::Field(field)
    }
}

impl<B: Backend> From<VoxelShiftMap<B>> for Value<B> {
    fn from(vsm: VoxelShiftMap<B>) -> Self {
        Self::ShiftMap(vsm)
    }
}

impl<B: Backend> From<Report> for Value<B> {
    fn from(report: Report) -> Self {
        Self::Artifact(report)
    }
}
