use std::f32::consts::PI;

use burn_ndarray::NdArray;
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use sdc_core::image::{Geometry, Image};
use sdc_core::units::{demean, fill_with_ones, hz_to_rad_per_sec, masked_median};

type Backend = NdArray<f32>;

fn volume(values: Vec<f32>) -> Image<Backend, 3> {
    let n = values.len();
    let geometry = Geometry::identity()
        .with_origin(Point3::new(-12.0, 4.0, 30.0))
        .with_spacing(Vector3::new(2.0, 2.0, 3.0));
    Image::from_values(values, [1, 1, n], geometry, &Default::default()).unwrap()
}

proptest! {
    #[test]
    fn test_hz_to_rad_per_sec_is_elementwise(values in prop::collection::vec(-500.0f32..500.0, 1..64)) {
        let field = volume(values.clone());
        let out = hz_to_rad_per_sec(&field);

        prop_assert_eq!(out.shape(), field.shape());
        prop_assert_eq!(out.geometry(), field.geometry());
        for (o, v) in out.values().unwrap().iter().zip(&values) {
            let expected = v * 2.0 * PI;
            prop_assert!((o - expected).abs() <= 1e-3 * expected.abs().max(1.0));
        }
    }

    #[test]
    fn test_demean_zeroes_masked_median(
        pairs in prop::collection::vec((-50.0f32..50.0, prop::bool::ANY), 1..64)
    ) {
        prop_assume!(pairs.iter().any(|(_, m)| *m));
        let values: Vec<f32> = pairs.iter().map(|(v, _)| *v).collect();
        let mask: Vec<f32> = pairs.iter().map(|(_, m)| if *m { 1.0 } else { 0.0 }).collect();

        let field = volume(values.clone());
        let mask = volume(mask);
        let out = demean(&field, &mask).unwrap();

        let centered = masked_median(&out, &mask).unwrap();
        prop_assert!(centered.abs() < 1e-3, "median after demean: {}", centered);

        // Every voxel moved by the same constant.
        let out_values = out.values().unwrap();
        let offset = values[0] - out_values[0];
        for (v, o) in values.iter().zip(&out_values) {
            prop_assert!(((v - o) - offset).abs() < 1e-3);
        }
    }
}

#[test]
fn test_fill_with_ones_matches_reference_grid() {
    let reference = volume(vec![3.0, -1.0, 8.0]);
    let ones = fill_with_ones(&reference);
    assert!(ones.same_grid(&reference, 0.0));
    assert_eq!(ones.values().unwrap(), vec![1.0; 3]);
}
