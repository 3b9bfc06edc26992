//! Fieldmap-based susceptibility distortion correction.
//!
//! A measured fieldmap (Hz) is registered and resampled into the space of
//! the reference, converted to a voxel-shift map along the phase-encoding
//! axis, promoted to a displacement field and used to unwarp the reference.
//! Voxels outside the coverage of the fieldmap are zeroed before the brain
//! mask is recomputed.

use tracing::{debug, info};

use crate::config::FieldmapUnwarpConfig;
use crate::error::Result;
use sdc_core::Interpolation;
use sdc_graph::{Node, NodeKind, PortSpec, PortType, Workflow, INPUT_NODE, OUTPUT_NODE};

/// Boundary inputs shared by both correction workflows.
pub(crate) fn reference_inputs() -> Vec<PortSpec> {
    vec![
        PortSpec::required("in_reference", PortType::Image),
        PortSpec::required("in_mask", PortType::Mask),
        PortSpec::required("name_source", PortType::Identifier),
    ]
}

/// Boundary outputs shared by both correction workflows.
pub(crate) fn correction_outputs() -> Vec<PortSpec> {
    vec![
        PortSpec::required("out_reference", PortType::Image),
        PortSpec::required("out_warp", PortType::Field),
        PortSpec::required("out_mask", PortType::Mask),
        PortSpec::required("out_jacobian", PortType::Image),
        PortSpec::required("out_mask_report", PortType::Artifact),
    ]
}

/// Build the fieldmap unwarping workflow.
///
/// Inputs: `in_reference`, `in_mask`, `name_source`, `fmap` (Hz), `fmap_ref`
/// and `fmap_mask`. Outputs: `out_reference`, `out_warp`, `out_mask`,
/// `out_jacobian` and `out_mask_report`.
///
/// `fmap_bspline` decides whether shift estimation sees the resampled
/// fieldmap mask and `fmap_demean` whether a demean node sits between shift
/// estimation and field conversion. Exactly one variant of each is wired.
#[tracing::instrument(skip_all, fields(name = %config.name))]
pub fn init_sdc_unwarp_wf(config: &FieldmapUnwarpConfig) -> Result<Workflow> {
    config.validate()?;

    let mut inputs = reference_inputs();
    inputs.extend([
        PortSpec::required("fmap", PortType::Image),
        PortSpec::required("fmap_ref", PortType::Image),
        PortSpec::required("fmap_mask", PortType::Mask),
    ]);
    let mut wf = Workflow::new(config.name.clone(), inputs, correction_outputs());

    let apply = |interpolation| NodeKind::ApplyTransform { interpolation };
    wf.add_node(Node::new("meta", NodeKind::ReadMetadata))?;
    wf.add_node(Node::new("ec", NodeKind::EchoSpacing))?;
    wf.add_node(Node::new("pedir", NodeKind::PeDirection))?;
    wf.add_node(Node::new("explicit_mask_epi", NodeKind::ApplyMask))?;
    wf.add_node(Node::new(
        "fmap2ref_reg",
        NodeKind::Register {
            preset: config.registration,
        },
    ))?;
    wf.add_node(Node::new("fmap2ref_apply", apply(Interpolation::BSpline)))?;
    wf.add_node(Node::new("fmap_mask2ref_apply", apply(Interpolation::NearestNeighbor)))?;
    wf.add_node(Node::new("torads", NodeKind::HzToRadPerSec))?;
    wf.add_node(Node::new("gen_vsm", NodeKind::FieldmapUnwarp))?;
    wf.add_node(Node::new("vsm2dfm", NodeKind::ShiftToField))?;
    wf.add_node(Node::new("jac_dfm", NodeKind::Jacobian))?;
    wf.add_node(Node::new("unwarp_reference", apply(Interpolation::LanczosWindowedSinc)))?;
    wf.add_node(Node::new("fieldmap_fov_mask", NodeKind::FillWithOnes))?;
    wf.add_node(Node::new("fmap_fov2ref_apply", apply(Interpolation::NearestNeighbor)))?;
    wf.add_node(Node::new("apply_fov_mask", NodeKind::ApplyMask))?;
    wf.add_node(Node::new("ref_msk_post", NodeKind::EstimateMask))?;

    // Metadata of the reference
    wf.connect(INPUT_NODE, "name_source", "meta", "source")?;
    wf.connect("meta", "metadata", "ec", "metadata")?;
    wf.connect("meta", "metadata", "pedir", "metadata")?;

    // Fieldmap into reference space
    wf.connect_all(
        INPUT_NODE,
        "explicit_mask_epi",
        &[("in_reference", "in_file"), ("in_mask", "mask_file")],
    )?;
    wf.connect(INPUT_NODE, "fmap_ref", "fmap2ref_reg", "moving")?;
    wf.connect("explicit_mask_epi", "out_file", "fmap2ref_reg", "fixed")?;
    for (node, input) in [("fmap2ref_apply", "fmap"), ("fmap_mask2ref_apply", "fmap_mask")] {
        wf.connect(INPUT_NODE, input, node, "input_image")?;
        wf.connect(INPUT_NODE, "in_reference", node, "reference_image")?;
        wf.connect("fmap2ref_reg", "transform", node, "transforms")?;
    }

    // Shift map and displacement field
    wf.connect("fmap2ref_apply", "output_image", "torads", "in_file")?;
    wf.connect("torads", "out_file", "gen_vsm", "fmap_in_file")?;
    wf.connect("ec", "echo_spacing", "gen_vsm", "dwell_time")?;
    wf.connect("pedir", "pe_direction", "gen_vsm", "unwarp_direction")?;
    wf.connect("pedir", "pe_direction", "vsm2dfm", "pe_dir")?;
    if !config.fmap_bspline {
        wf.connect("fmap_mask2ref_apply", "output_image", "gen_vsm", "mask_file")?;
    }
    if config.fmap_demean {
        wf.add_node(Node::new("demean", NodeKind::Demean))?;
        wf.connect("gen_vsm", "shift_out_file", "demean", "in_file")?;
        wf.connect("fmap_mask2ref_apply", "output_image", "demean", "in_mask")?;
        wf.connect("demean", "out_file", "vsm2dfm", "in_file")?;
    } else {
        wf.connect("gen_vsm", "shift_out_file", "vsm2dfm", "in_file")?;
    }
    debug!(
        masked_shift = !config.fmap_bspline,
        demean = config.fmap_demean,
        "selected shift-map wiring"
    );
    wf.connect("vsm2dfm", "out_file", "jac_dfm", "deformation_field")?;

    // Unwarp, then restrict to the fieldmap field of view
    wf.connect("vsm2dfm", "out_file", "unwarp_reference", "transforms")?;
    wf.connect(INPUT_NODE, "in_reference", "unwarp_reference", "input_image")?;
    wf.connect(INPUT_NODE, "in_reference", "unwarp_reference", "reference_image")?;
    wf.connect(INPUT_NODE, "fmap_ref", "fieldmap_fov_mask", "in_file")?;
    wf.connect("fieldmap_fov_mask", "out_file", "fmap_fov2ref_apply", "input_image")?;
    wf.connect(INPUT_NODE, "in_reference", "fmap_fov2ref_apply", "reference_image")?;
    wf.connect("fmap2ref_reg", "transform", "fmap_fov2ref_apply", "transforms")?;
    wf.connect("unwarp_reference", "output_image", "apply_fov_mask", "in_file")?;
    wf.connect("fmap_fov2ref_apply", "output_image", "apply_fov_mask", "mask_file")?;
    wf.connect("apply_fov_mask", "out_file", "ref_msk_post", "in_file")?;

    wf.connect("apply_fov_mask", "out_file", OUTPUT_NODE, "out_reference")?;
    wf.connect("vsm2dfm", "out_file", OUTPUT_NODE, "out_warp")?;
    wf.connect("ref_msk_post", "mask_file", OUTPUT_NODE, "out_mask")?;
    wf.connect("ref_msk_post", "out_report", OUTPUT_NODE, "out_mask_report")?;
    wf.connect("jac_dfm", "jacobian_image", OUTPUT_NODE, "out_jacobian")?;

    if let Some(reportlets) = &config.reportlets {
        for (node, tag, source) in [
            ("ds_reg", "fmap_reg", "fmap2ref_reg"),
            ("ds_reg_vsm", "fmap_reg_vsm", "fmap2ref_apply"),
        ] {
            let kind = NodeKind::ReportSink {
                tag: tag.to_string(),
                base_directory: reportlets.clone(),
            };
            wf.add_node(Node::new(node, kind))?;
            wf.connect(INPUT_NODE, "name_source", node, "source_file")?;
            wf.connect(source, "out_report", node, "in_file")?;
        }
    }

    wf.validate()?;
    info!(nodes = wf.nodes().len(), edges = wf.edges().len(), "built fieldmap workflow");
    Ok(wf)
}
