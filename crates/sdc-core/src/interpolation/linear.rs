//! Trilinear interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;
use crate::error::Result;

/// Trilinear interpolation on volumes.
///
/// Used to sample displacement-field components between grid points.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

/// Lower and upper neighbor along one axis plus the weight of the upper one.
///
/// The weight is taken before clamping, so samples past the edge collapse
/// onto the edge voxel.
fn bracket<B: Backend>(coord: Tensor<B, 1>, len: usize) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>, Tensor<B, 1>) {
    let lower = coord.clone().floor();
    let weight = coord - lower.clone();
    let last = (len - 1) as f64;
    let upper = (lower.clone() + 1.0).clamp(0.0, last).int();
    (lower.clamp(0.0, last).int(), upper, weight)
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let [batch, _] = indices.dims();
        let device = indices.device();
        let column = |axis: usize| indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
        let axes = [bracket(column(0), d2), bracket(column(1), d1), bracket(column(2), d0)];
        let strides = [1i32, d2 as i32, (d1 * d2) as i32];
        let flat = data.clone().reshape([d0 * d1 * d2]);

        // Bit k of `corner` selects the upper neighbor along axis k.
        let mut acc = Tensor::<B, 1>::zeros([batch], &device);
        for corner in 0..8usize {
            let mut offset = Tensor::<B, 1, Int>::zeros([batch], &device);
            let mut weight = Tensor::<B, 1>::ones([batch], &device);
            for (k, (lower, upper, w)) in axes.iter().enumerate() {
                if corner & (1 << k) != 0 {
                    offset = offset + upper.clone() * strides[k];
                    weight = weight * w.clone();
                } else {
                    offset = offset + lower.clone() * strides[k];
                    weight = weight * (w.clone().neg() + 1.0);
                }
            }
            acc = acc + flat.clone().gather(0, offset) * weight;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn cube() -> Tensor<TestBackend, 3> {
        // value = 100 z + 10 y + x on a 2x2x2 grid
        let values = vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        Tensor::from_data(TensorData::new(values, Shape::new([2, 2, 2])), &Default::default())
    }

    #[test]
    fn test_linear_exact_grid_points() {
        let device = Default::default();
        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            &device,
        );
        let result = LinearInterpolator::new().interpolate(&cube(), indices).unwrap();
        assert_eq!(result.into_data().as_slice::<f32>().unwrap(), &[0.0, 1.0, 10.0, 100.0]);
    }

    #[test]
    fn test_linear_midpoint() {
        let device = Default::default();
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.5, 0.5, 0.5]], &device);
        let result = LinearInterpolator::new().interpolate(&cube(), indices).unwrap();
        let value = result.into_data().as_slice::<f32>().unwrap()[0];
        assert!((value - 55.5).abs() < 1e-4, "expected 55.5, got {value}");
    }
}
