//! Nodes: named units of computation with fixed port sets.
//!
//! A node never carries behavior. Its [`NodeKind`] names the operation and
//! holds the static parameters; the executor maps each kind onto a numeric
//! unit or a bound capability.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::capability::RegistrationPreset;
use crate::port::{PortSpec, PortType};
use sdc_core::Interpolation;

/// The operation a node performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NodeKind {
    /// Identity pass-through used for workflow inputs and outputs.
    Boundary { ports: Vec<PortSpec> },
    /// Sidecar metadata for an identifier.
    ReadMetadata,
    /// Load a volume from a path.
    ReadImage,
    /// Effective echo spacing out of a metadata record.
    EchoSpacing,
    /// Phase-encoding direction out of a metadata record.
    PeDirection,
    ApplyMask,
    Register { preset: RegistrationPreset },
    ApplyTransform { interpolation: Interpolation },
    HzToRadPerSec,
    FieldmapUnwarp,
    Demean,
    ShiftToField,
    Jacobian,
    FillWithOnes,
    EstimateMask,
    BiasCorrect,
    CopyHeader,
    CopyHeaderSeries,
    Concatenate,
    AcquisitionTable,
    BlipPair,
    PickFirst { ty: PortType },
    PromoteToVectorField { component: usize },
    Multiply,
    /// Hand an artifact to the report sink, under `base_directory`.
    ReportSink { tag: String, base_directory: PathBuf },
}

impl NodeKind {
    pub fn inputs(&self) -> Vec<PortSpec> {
        use PortType::*;
        let req = PortSpec::required;
        match self {
            Self::Boundary { ports } => ports.clone(),
            Self::ReadMetadata => vec![req("source", Identifier)],
            Self::ReadImage => vec![req("path", Path)],
            Self::EchoSpacing | Self::PeDirection => vec![req("metadata", Metadata)],
            Self::ApplyMask => vec![req("in_file", Image), req("mask_file", Mask)],
            Self::Register { .. } => vec![req("moving", Image), req("fixed", Image)],
            Self::ApplyTransform { .. } => vec![
                req("input_image", Image),
                req("reference_image", Image),
                req("transforms", Transform),
            ],
            Self::HzToRadPerSec | Self::FillWithOnes => vec![req("in_file", Image)],
            Self::FieldmapUnwarp => vec![
                req("fmap_in_file", Image),
                req("dwell_time", Scalar),
                req("unwarp_direction", PeDirection),
                PortSpec::optional("mask_file", Mask),
            ],
            Self::Demean => vec![req("in_file", ShiftMap), req("in_mask", Mask)],
            Self::ShiftToField => vec![req("in_file", ShiftMap), req("pe_dir", PeDirection)],
            Self::Jacobian => vec![req("deformation_field", Field)],
            Self::EstimateMask => vec![req("in_file", Image)],
            Self::BiasCorrect => vec![req("input_image", Image)],
            Self::CopyHeader => vec![req("hdr_file", Image), req("in_file", Image)],
            Self::CopyHeaderSeries => vec![req("hdr_file", Image), req("in_file", Series)],
            Self::Concatenate => vec![req("in_files", Image).collection()],
            Self::AcquisitionTable => vec![req("reference", Metadata), req("volumes", Metadata).collection()],
            Self::BlipPair => vec![req("in_file", Series), req("encoding_file", Table)],
            Self::PickFirst { ty } => vec![req("items", *ty).collection()],
            Self::PromoteToVectorField { .. } => vec![req("in_file", Series)],
            Self::Multiply => vec![req("in_file", Image), req("operand_file", Image)],
            Self::ReportSink { .. } => vec![req("source_file", Identifier), req("in_file", Artifact)],
        }
    }

    pub fn outputs(&self) -> Vec<PortSpec> {
        use PortType::*;
        let out = PortSpec::required;
        match self {
            Self::Boundary { ports } => ports.clone(),
            Self::ReadMetadata => vec![out("metadata", Metadata)],
            Self::ReadImage => vec![out("image", Image)],
            Self::EchoSpacing => vec![out("echo_spacing", Scalar)],
            Self::PeDirection => vec![out("pe_direction", PeDirection)],
            Self::Register { .. } => vec![
                out("transform", Transform),
                out("warped_image", Image),
                out("out_report", Artifact),
            ],
            Self::ApplyTransform { .. } => vec![out("output_image", Image), out("out_report", Artifact)],
            Self::ApplyMask
            | Self::HzToRadPerSec
            | Self::FillWithOnes
            | Self::CopyHeader
            | Self::Multiply => vec![out("out_file", Image)],
            Self::FieldmapUnwarp => vec![out("shift_out_file", ShiftMap)],
            Self::Demean => vec![out("out_file", ShiftMap)],
            Self::ShiftToField | Self::PromoteToVectorField { .. } => vec![out("out_file", Field)],
            Self::Jacobian => vec![out("jacobian_image", Image)],
            Self::EstimateMask => vec![out("mask_file", Mask), out("out_report", Artifact)],
            Self::BiasCorrect => vec![out("output_image", Image)],
            Self::CopyHeaderSeries => vec![out("out_file", Series)],
            Self::Concatenate => vec![out("merged_file", Series)],
            Self::AcquisitionTable => vec![out("table", Table)],
            Self::BlipPair => vec![out("out_warps", Series).collection(), out("out_jacs", Image).collection()],
            Self::PickFirst { ty } => vec![out("first", *ty)],
            Self::ReportSink { .. } => Vec::new(),
        }
    }

    /// Name of the capability this kind invokes, if any.
    pub fn capability(&self) -> Option<&'static str> {
        match self {
            Self::ReadMetadata => Some("metadata_reader"),
            Self::ReadImage => Some("image_reader"),
            Self::Register { .. } => Some("registration"),
            Self::ApplyTransform { .. } => Some("transform_applier"),
            Self::FieldmapUnwarp => Some("fieldmap_unwarp"),
            Self::EstimateMask => Some("mask_estimator"),
            Self::BiasCorrect => Some("bias_corrector"),
            Self::CopyHeader | Self::CopyHeaderSeries => Some("header_repair"),
            Self::BlipPair => Some("blip_pair_estimator"),
            Self::ReportSink { .. } => Some("report_sink"),
            _ => None,
        }
    }

    /// Short label for diagrams and logs.
    pub fn label(&self) -> String {
        let name = match self {
            Self::Boundary { .. } => "boundary",
            Self::ReadMetadata => "read_metadata",
            Self::ReadImage => "read_image",
            Self::EchoSpacing => "echo_spacing",
            Self::PeDirection => "pe_direction",
            Self::ApplyMask => "apply_mask",
            Self::Register { preset } => return format!("register[{preset}]"),
            Self::ApplyTransform { interpolation } => return format!("apply_transform[{interpolation}]"),
            Self::HzToRadPerSec => "hz_to_rad_per_sec",
            Self::FieldmapUnwarp => "fieldmap_unwarp",
            Self::Demean => "demean",
            Self::ShiftToField => "shift_to_field",
            Self::Jacobian => "jacobian",
            Self::FillWithOnes => "fill_with_ones",
            Self::EstimateMask => "estimate_mask",
            Self::BiasCorrect => "bias_correct",
            Self::CopyHeader => "copy_header",
            Self::CopyHeaderSeries => "copy_header_series",
            Self::Concatenate => "concatenate",
            Self::AcquisitionTable => "acquisition_table",
            Self::BlipPair => "blip_pair",
            Self::PickFirst { ty } => return format!("pick_first[{ty}]"),
            Self::PromoteToVectorField { component } => return format!("promote_to_vector_field[{component}]"),
            Self::Multiply => "multiply",
            Self::ReportSink { tag, .. } => return format!("report_sink[{tag}]"),
        };
        name.to_string()
    }
}

/// Apply a node independently to each element of same-length input lists.
///
/// Inputs named in `iterfields` carry lists of exactly `width` elements; other
/// inputs are broadcast. Every output becomes a list of `width` elements in
/// input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOut {
    pub width: usize,
    pub iterfields: Vec<String>,
}

impl FanOut {
    pub fn new<S: Into<String>>(width: usize, iterfields: impl IntoIterator<Item = S>) -> Self {
        Self {
            width,
            iterfields: iterfields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A node in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<FanOut>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fan_out: None,
        }
    }

    /// Turn this node into a fan-out node.
    pub fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    pub fn input(&self, port: &str) -> Option<PortSpec> {
        self.kind.inputs().into_iter().find(|p| p.name == port)
    }

    pub fn output(&self, port: &str) -> Option<PortSpec> {
        self.kind.outputs().into_iter().find(|p| p.name == port)
    }

    /// Whether `port` is iterated over by this node's fan-out.
    pub fn is_iterfield(&self, port: &str) -> bool {
        self.fan_out
            .as_ref()
            .is_some_and(|f| f.iterfields.iter().any(|i| i == port))
    }

    pub fn width(&self) -> Option<usize> {
        self.fan_out.as_ref().map(|f| f.width)
    }
}
