//! Nearest neighbor interpolation.
//!
//! Used for label-like volumes (masks, field-of-view supports) where
//! intermediate values have no meaning.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Interpolator;
use crate::error::Result;

/// Nearest Neighbor Interpolator.
///
/// Rounds each coordinate to the nearest voxel and gathers its value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    /// Create a new nearest neighbor interpolator.
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let batch = indices.dims()[0];

        let x = indices.clone().slice([0..batch, 0..1]).squeeze::<1>(1);
        let y = indices.clone().slice([0..batch, 1..2]).squeeze::<1>(1);
        let z = indices.slice([0..batch, 2..3]).squeeze::<1>(1);

        let x_i = x.round().clamp(0.0, (d2 - 1) as f64).int();
        let y_i = y.round().clamp(0.0, (d1 - 1) as f64).int();
        let z_i = z.round().clamp(0.0, (d0 - 1) as f64).int();

        let stride_z = (d1 * d2) as i32;
        let stride_y = d2 as i32;

        let idx = z_i * stride_z + y_i * stride_y + x_i;
        let flat_data = data.clone().reshape([d0 * d1 * d2]);
        Ok(flat_data.gather(0, idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_nearest_axes_follow_xyz_order() {
        let device = Default::default();
        // [Z=2, Y=2, X=2], value = 100 z + 10 y + x
        let values = vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        let data = Tensor::<TestBackend, 3>::from_data(TensorData::new(values, Shape::new([2, 2, 2])), &device);

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.6, 0.4, 0.9]],
            &device,
        );
        let result = NearestNeighborInterpolator::new().interpolate(&data, indices).unwrap();
        let result = result.into_data();
        assert_eq!(result.as_slice::<f32>().unwrap(), &[1.0, 10.0, 100.0, 101.0]);
    }

    #[test]
    fn test_nearest_clamps_outside_grid() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0, 2.0], Shape::new([1, 1, 2])),
            &device,
        );
        let indices = Tensor::<TestBackend, 2>::from_floats([[-3.0, 0.0, 0.0], [7.0, 0.0, 0.0]], &device);
        let result = NearestNeighborInterpolator::new().interpolate(&data, indices).unwrap();
        assert_eq!(result.into_data().as_slice::<f32>().unwrap(), &[1.0, 2.0]);
    }
}
