use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use nalgebra::{Matrix3, Point3, Vector3};
use proptest::prelude::*;
use sdc_core::image::{Geometry, Image};

type Backend = NdArray<f32>;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Matrix3<f64> {
    let (sx, cx) = angle_x.sin_cos();
    let (sy, cy) = angle_y.sin_cos();
    let (sz, cz) = angle_z.sin_cos();

    let rz = Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0);
    let ry = Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy);
    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx);
    rx * ry * rz
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([2, 2, 2], &device);
        let geometry = Geometry::new(
            Point3::new(ox, oy, oz),
            Vector3::new(sx, sy, sz),
            make_rotation(ax, ay, az),
        );
        let image = Image::new(data, geometry);
        let point = Point3::new(px, py, pz);

        let index = image.transform_physical_point_to_continuous_index(&point).unwrap();
        let recovered = image.transform_continuous_index_to_physical_point(&index);

        prop_assert!((point[0] - recovered[0]).abs() < 1e-4, "X mismatch: {} vs {}", point[0], recovered[0]);
        prop_assert!((point[1] - recovered[1]).abs() < 1e-4, "Y mismatch: {} vs {}", point[1], recovered[1]);
        prop_assert!((point[2] - recovered[2]).abs() < 1e-4, "Z mismatch: {} vs {}", point[2], recovered[2]);
    }

    #[test]
    fn test_tensor_batch_matches_scalar_mapping(
        ox in -10.0f64..10.0,
        sx in 0.5f64..2.0,
        ax in -1.5f64..1.5,
        px in -10.0f64..10.0,
        py in -10.0f64..10.0
    ) {
        let device = Default::default();
        let geometry = Geometry::new(
            Point3::new(ox, -ox, 0.5 * ox),
            Vector3::new(sx, 1.0, 2.0 * sx),
            make_rotation(0.0, 0.0, ax),
        );
        let image = Image::new(Tensor::<Backend, 3>::zeros([2, 2, 2], &device), geometry);

        let point = Point3::new(px, py, 1.0);
        let expected = image.transform_physical_point_to_continuous_index(&point).unwrap();
        let batch = Tensor::<Backend, 2>::from_floats([[px as f32, py as f32, 1.0]], &device);
        let indices = image.world_to_index_tensor(batch).unwrap().into_data().to_vec::<f32>().unwrap();

        for axis in 0..3 {
            prop_assert!((indices[axis] as f64 - expected[axis]).abs() < 1e-3);
        }
    }
}
