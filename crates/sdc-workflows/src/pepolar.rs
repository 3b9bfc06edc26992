//! Phase-encoding-polarity ("blip pair") distortion correction.
//!
//! Opposite-phase-encoded volumes are bias-corrected, merged with the
//! reference and handed to a blip-pair estimator together with a synthesized
//! acquisition table. The first estimated displacement field unwarps the
//! reference and the matching Jacobian rescales its intensities.

use tracing::{debug, info};

use crate::config::{MergeInputs, PepolarUnwarpConfig};
use crate::error::Result;
use crate::fieldmap::{correction_outputs, reference_inputs};
use sdc_core::Interpolation;
use sdc_graph::{FanOut, Literal, Node, NodeKind, PortType, Workflow, INPUT_NODE, OUTPUT_NODE};

/// Build the PEPOLAR unwarping workflow.
///
/// Inputs: `in_reference`, `in_mask` and `name_source`. The opposite-phase
/// volumes and their metadata root are build-time parameters. Outputs match
/// [`init_sdc_unwarp_wf`](crate::init_sdc_unwarp_wf); `out_reference` is the
/// unwarped reference before Jacobian modulation.
#[tracing::instrument(skip_all, fields(name = %config.name, volumes = config.fmaps.len()))]
pub fn init_pepolar_unwarp_wf(config: &PepolarUnwarpConfig) -> Result<Workflow> {
    config.validate()?;

    let fmaps = config.resolved_fmaps();
    let width = fmaps.len();
    let mut wf = Workflow::new(config.name.clone(), reference_inputs(), correction_outputs());

    let per_volume = |fields: &[&str]| FanOut::new(width, fields.iter().copied());
    wf.add_node(Node::new("read_epi", NodeKind::ReadImage).fan_out(per_volume(&["path"])))?;
    wf.add_node(Node::new("epi_meta", NodeKind::ReadMetadata).fan_out(per_volume(&["source"])))?;
    wf.add_node(Node::new("meta_ref", NodeKind::ReadMetadata))?;
    wf.add_node(Node::new("mag_inu", NodeKind::BiasCorrect).fan_out(per_volume(&["input_image"])))?;
    wf.add_node(Node::new("cphdr", NodeKind::CopyHeader).fan_out(per_volume(&["hdr_file", "in_file"])))?;
    wf.add_node(Node::new("merge", NodeKind::Concatenate))?;
    wf.add_node(Node::new("generate_idata", NodeKind::AcquisitionTable))?;
    wf.add_node(Node::new("topup", NodeKind::BlipPair))?;
    wf.add_node(Node::new("pick_warp", NodeKind::PickFirst { ty: PortType::Series }))?;
    wf.add_node(Node::new("pick_jac", NodeKind::PickFirst { ty: PortType::Image }))?;
    wf.add_node(Node::new("cphdr_warp", NodeKind::CopyHeaderSeries))?;
    wf.add_node(Node::new("to_ants", NodeKind::PromoteToVectorField { component: 0 }))?;
    wf.add_node(Node::new(
        "unwarp_reference",
        NodeKind::ApplyTransform {
            interpolation: Interpolation::LanczosWindowedSinc,
        },
    ))?;
    wf.add_node(Node::new("apply_jacobian", NodeKind::Multiply))?;
    wf.add_node(Node::new("ref_msk_post", NodeKind::EstimateMask))?;

    // Per-volume preparation
    wf.set_input("read_epi", "path", Literal::Paths(fmaps.clone()))?;
    wf.set_input("epi_meta", "source", Literal::Paths(fmaps))?;
    wf.connect("read_epi", "image", "mag_inu", "input_image")?;
    wf.connect("read_epi", "image", "cphdr", "hdr_file")?;
    wf.connect("mag_inu", "output_image", "cphdr", "in_file")?;

    // Merge: reference first, then each volume in input order
    match config.merge_inputs {
        MergeInputs::Masked => {
            wf.add_node(Node::new("explicit_mask_epi", NodeKind::ApplyMask))?;
            wf.add_node(Node::new("skullstrip", NodeKind::EstimateMask).fan_out(per_volume(&["in_file"])))?;
            wf.add_node(
                Node::new("apply_skullstrip", NodeKind::ApplyMask).fan_out(per_volume(&["in_file", "mask_file"])),
            )?;
            wf.connect_all(
                INPUT_NODE,
                "explicit_mask_epi",
                &[("in_reference", "in_file"), ("in_mask", "mask_file")],
            )?;
            wf.connect("cphdr", "out_file", "skullstrip", "in_file")?;
            wf.connect("cphdr", "out_file", "apply_skullstrip", "in_file")?;
            wf.connect("skullstrip", "mask_file", "apply_skullstrip", "mask_file")?;
            wf.connect("explicit_mask_epi", "out_file", "merge", "in_files")?;
            wf.connect("apply_skullstrip", "out_file", "merge", "in_files")?;
        }
        MergeInputs::Unmasked => {
            wf.connect(INPUT_NODE, "in_reference", "merge", "in_files")?;
            wf.connect("cphdr", "out_file", "merge", "in_files")?;
        }
    }
    debug!(merge_inputs = ?config.merge_inputs, "selected merge inputs");

    // Blip-pair estimation
    wf.connect(INPUT_NODE, "name_source", "meta_ref", "source")?;
    wf.connect("meta_ref", "metadata", "generate_idata", "reference")?;
    wf.connect("epi_meta", "metadata", "generate_idata", "volumes")?;
    wf.connect("merge", "merged_file", "topup", "in_file")?;
    wf.connect("generate_idata", "table", "topup", "encoding_file")?;
    wf.connect("topup", "out_warps", "pick_warp", "items")?;
    wf.connect("topup", "out_jacs", "pick_jac", "items")?;

    // Unwarp and modulate
    wf.connect(INPUT_NODE, "in_reference", "cphdr_warp", "hdr_file")?;
    wf.connect("pick_warp", "first", "cphdr_warp", "in_file")?;
    wf.connect("cphdr_warp", "out_file", "to_ants", "in_file")?;
    wf.connect("to_ants", "out_file", "unwarp_reference", "transforms")?;
    wf.connect(INPUT_NODE, "in_reference", "unwarp_reference", "input_image")?;
    wf.connect(INPUT_NODE, "in_reference", "unwarp_reference", "reference_image")?;
    wf.connect("unwarp_reference", "output_image", "apply_jacobian", "in_file")?;
    wf.connect("pick_jac", "first", "apply_jacobian", "operand_file")?;
    wf.connect("apply_jacobian", "out_file", "ref_msk_post", "in_file")?;

    wf.connect("unwarp_reference", "output_image", OUTPUT_NODE, "out_reference")?;
    wf.connect("to_ants", "out_file", OUTPUT_NODE, "out_warp")?;
    wf.connect("ref_msk_post", "mask_file", OUTPUT_NODE, "out_mask")?;
    wf.connect("ref_msk_post", "out_report", OUTPUT_NODE, "out_mask_report")?;
    wf.connect("pick_jac", "first", OUTPUT_NODE, "out_jacobian")?;

    wf.validate()?;
    info!(nodes = wf.nodes().len(), edges = wf.edges().len(), "built PEPOLAR workflow");
    Ok(wf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use std::path::PathBuf;

    fn config(n: usize) -> PepolarUnwarpConfig {
        let fmaps: Vec<PathBuf> = (0..n).map(|i| PathBuf::from(format!("fmap/sub-01_run-{i}_epi.nii.gz"))).collect();
        PepolarUnwarpConfig::new(fmaps, "/bids")
    }

    #[test]
    fn test_empty_fmaps_is_rejected() {
        assert_eq!(init_pepolar_unwarp_wf(&config(0)).unwrap_err(), WorkflowError::EmptyFmaps);
    }

    #[test]
    fn test_fan_out_width_follows_fmaps() {
        let wf = init_pepolar_unwarp_wf(&config(3)).unwrap();
        for name in ["read_epi", "epi_meta", "mag_inu", "cphdr", "skullstrip", "apply_skullstrip"] {
            assert_eq!(wf.node(name).and_then(|n| n.width()), Some(3), "{name}");
        }
        assert!(matches!(
            wf.literal("read_epi", "path"),
            Some(Literal::Paths(paths)) if paths[0] == PathBuf::from("/bids/fmap/sub-01_run-0_epi.nii.gz")
        ));
    }

    #[test]
    fn test_merge_order_masked() {
        let wf = init_pepolar_unwarp_wf(&config(2)).unwrap();
        let sources: Vec<&str> = wf.edges_into("merge", "in_files").map(|e| e.src.as_str()).collect();
        assert_eq!(sources, ["explicit_mask_epi", "apply_skullstrip"]);
    }

    #[test]
    fn test_merge_order_unmasked() {
        let wf = init_pepolar_unwarp_wf(&config(2).with_merge_inputs(MergeInputs::Unmasked)).unwrap();
        let sources: Vec<&str> = wf.edges_into("merge", "in_files").map(|e| e.src.as_str()).collect();
        assert_eq!(sources, [INPUT_NODE, "cphdr"]);
        assert!(!wf.contains("skullstrip"));
        assert!(!wf.contains("explicit_mask_epi"));
    }

    #[test]
    fn test_reference_output_precedes_jacobian() {
        let wf = init_pepolar_unwarp_wf(&config(1)).unwrap();
        let edge = wf.edges_into(OUTPUT_NODE, "out_reference").next().unwrap();
        assert_eq!(edge.src, "unwarp_reference");
    }
}
