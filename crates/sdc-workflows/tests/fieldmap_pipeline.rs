mod common;

use common::{reference, volume, Backend, IdentityRegistration, SidecarStub, ThresholdMask};
use sdc_core::Image;
use sdc_graph::{Capabilities, Executor, PortValues, Value};
use sdc_workflows::{init_sdc_unwarp_wf, FieldmapUnwarpConfig};

const SHAPE: [usize; 3] = [4, 5, 6];

const NAME_SOURCE: &str = "sub-01_task-rest_bold.nii.gz";

fn executor() -> Executor<Backend> {
    executor_reading_as(NAME_SOURCE)
}

/// The reference reads as `j` when it is `j_source`, otherwise as `j-`.
fn executor_reading_as(j_source: &str) -> Executor<Backend> {
    Executor::new(
        Capabilities::default()
            .with_metadata_reader(SidecarStub {
                name_source: j_source.into(),
            })
            .with_registration(IdentityRegistration)
            .with_mask_estimator(ThresholdMask),
    )
}

/// Fieldmap inputs on a grid that covers only `x < fmap_width` of the reference.
fn inputs(fmap_width: usize, fmap_hz: f32) -> PortValues<Backend> {
    inputs_with_fieldmap(volume([SHAPE[0], SHAPE[1], fmap_width], |_| fmap_hz))
}

fn inputs_with_fieldmap(fmap: Image<Backend, 3>) -> PortValues<Backend> {
    let fmap_shape = fmap.shape();
    let mut values = PortValues::new();
    values.insert("in_reference".into(), Value::Image(reference(SHAPE)));
    values.insert("in_mask".into(), Value::Image(volume(SHAPE, |_| 1.0)));
    values.insert("name_source".into(), Value::Text(NAME_SOURCE.into()));
    values.insert("fmap".into(), Value::Image(fmap));
    values.insert("fmap_ref".into(), Value::Image(volume(fmap_shape, |_| 100.0)));
    values.insert("fmap_mask".into(), Value::Image(volume(fmap_shape, |_| 1.0)));
    values
}

#[test]
fn test_zero_fieldmap_leaves_reference_unwarped() {
    let wf = init_sdc_unwarp_wf(&FieldmapUnwarpConfig::default()).unwrap();
    let outputs = executor().run(&wf, inputs(SHAPE[2], 0.0)).unwrap();

    let warp = outputs["out_warp"].as_field().unwrap();
    assert_eq!(warp.shape(), SHAPE);
    assert_eq!(warp.max_abs().unwrap(), 0.0);

    for j in outputs["out_jacobian"].as_image().unwrap().values().unwrap() {
        assert!((j - 1.0).abs() < 1e-6);
    }

    let expected = reference(SHAPE).values().unwrap();
    let actual = outputs["out_reference"].as_image().unwrap().values().unwrap();
    for (a, e) in actual.iter().zip(&expected) {
        assert!((a - e).abs() < 1e-4, "expected {e}, got {a}");
    }

    let mask = outputs["out_mask"].as_image().unwrap().values().unwrap();
    assert!(mask.iter().all(|&m| m == 1.0));
    assert!(matches!(outputs["out_mask_report"], Value::Artifact(_)));
}

#[test]
fn test_voxels_outside_fieldmap_coverage_are_zeroed() {
    let covered = 3;
    let config = FieldmapUnwarpConfig::default().with_fmap_demean(false);
    let wf = init_sdc_unwarp_wf(&config).unwrap();
    let outputs = executor().run(&wf, inputs(covered, 0.0)).unwrap();

    let expected = reference(SHAPE).values().unwrap();
    let actual = outputs["out_reference"].as_image().unwrap().values().unwrap();
    let mask = outputs["out_mask"].as_image().unwrap().values().unwrap();
    for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
        let x = i % SHAPE[2];
        if x < covered {
            assert!((a - e).abs() < 1e-4, "voxel {i}: expected {e}, got {a}");
            assert_eq!(mask[i], 1.0);
        } else {
            assert_eq!(*a, 0.0, "voxel {i} is outside the fieldmap");
            assert_eq!(mask[i], 0.0);
        }
    }
}

#[test]
fn test_uniform_offset_is_removed_by_demeaning() {
    // A constant off-resonance only shifts the whole image; demeaning within
    // the fieldmap mask cancels it.
    let wf = init_sdc_unwarp_wf(&FieldmapUnwarpConfig::default()).unwrap();
    let outputs = executor().run(&wf, inputs(SHAPE[2], 25.0)).unwrap();
    assert!(outputs["out_warp"].as_field().unwrap().max_abs().unwrap() < 1e-5);

    let wf = init_sdc_unwarp_wf(&FieldmapUnwarpConfig::default().with_fmap_demean(false)).unwrap();
    let outputs = executor().run(&wf, inputs(SHAPE[2], 25.0)).unwrap();
    let field = outputs["out_warp"].as_field().unwrap();
    // 25 Hz * 0.58 ms * 5 voxels along j = 0.0725 voxels (1 mm spacing)
    let y = field.component_image(1).unwrap().values().unwrap();
    assert!(y.iter().all(|v| (v - 0.0725).abs() < 1e-4), "got {:?}", &y[..3]);
    assert!(field.component_image(0).unwrap().values().unwrap().iter().all(|&v| v == 0.0));
}

/// 40 Hz stripe at y = 2 on top of a 5 Hz/voxel ramp along x.
fn striped_fieldmap_hz(i: usize) -> f32 {
    let (x, y) = (i % SHAPE[2], (i / SHAPE[2]) % SHAPE[1]);
    let stripe = if y == 2 { 40.0 } else { 0.0 };
    stripe + 5.0 * x as f32
}

#[test]
fn test_varying_fieldmap_gives_voxelwise_shift() {
    let config = FieldmapUnwarpConfig::default().with_fmap_demean(false);
    let wf = init_sdc_unwarp_wf(&config).unwrap();
    // 0.58 ms echo spacing, 5 voxels along j, 1 mm spacing
    let hz_to_mm = 0.00058 * SHAPE[1] as f32;

    for (j_source, sign) in [(NAME_SOURCE, 1.0f32), ("another_run", -1.0)] {
        let fmap = volume(SHAPE, striped_fieldmap_hz);
        let outputs = executor_reading_as(j_source).run(&wf, inputs_with_fieldmap(fmap)).unwrap();
        let field = outputs["out_warp"].as_field().unwrap();

        let y = field.component_image(1).unwrap().values().unwrap();
        for (i, v) in y.iter().enumerate() {
            let expected = sign * striped_fieldmap_hz(i) * hz_to_mm;
            assert!((v - expected).abs() < 1e-4, "voxel {i} (sign {sign}): expected {expected}, got {v}");
        }
        for axis in [0, 2] {
            let other = field.component_image(axis).unwrap().values().unwrap();
            assert!(other.iter().all(|&v| v == 0.0), "component {axis} should be zero");
        }
    }
}

#[test]
fn test_missing_registration_fails_with_node_context() {
    let wf = init_sdc_unwarp_wf(&FieldmapUnwarpConfig::default()).unwrap();
    let executor = Executor::new(
        Capabilities::default()
            .with_metadata_reader(SidecarStub {
                name_source: "x".into(),
            })
            .with_mask_estimator(ThresholdMask),
    );
    let err = executor.run(&wf, inputs(SHAPE[2], 0.0)).unwrap_err();
    assert!(err.to_string().contains("fmap2ref_reg"), "{err}");
}
