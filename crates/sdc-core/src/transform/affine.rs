//! Affine transform in homogeneous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use super::trait_::Transform;
use crate::error::{Result, SdcError};

/// Affine transform `T(x) = A x + t`, stored as a 4x4 homogeneous matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    matrix: Matrix4<f64>,
}

impl AffineTransform {
    /// Wrap a homogeneous matrix. The last row must be `[0, 0, 0, 1]`.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Result<Self> {
        let last = matrix.row(3);
        if last[0] != 0.0 || last[1] != 0.0 || last[2] != 0.0 || last[3] != 1.0 {
            return Err(SdcError::invalid_argument("affine matrix must end in [0, 0, 0, 1]"));
        }
        Ok(Self { matrix })
    }

    /// Build from a linear part and a translation.
    pub fn new(linear: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self { matrix: Matrix4::identity() }
    }

    pub fn translation(offset: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity(), offset)
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// The inverse transform, if the linear part is invertible.
    pub fn inverse(&self) -> Result<Self> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| SdcError::degenerate_geometry("affine matrix is singular"))
    }

    /// `self` applied after `first`.
    pub fn compose(&self, first: &Self) -> Self {
        Self { matrix: self.matrix * first.matrix }
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl<B: Backend> Transform<B> for AffineTransform {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let device = points.device();
        let linear = self.linear();
        let offset = self.offset();

        // Row vectors: y = x @ A^T + t
        let mut a_t = Vec::with_capacity(9);
        for r in 0..3 {
            for c in 0..3 {
                a_t.push(linear[(c, r)] as f32);
            }
        }
        let a_t = Tensor::<B, 2>::from_data(TensorData::new(a_t, Shape::new([3, 3])), &device);
        let t: Vec<f32> = offset.iter().map(|&v| v as f32).collect();
        let t = Tensor::<B, 1>::from_data(TensorData::new(t, Shape::new([3])), &device).reshape([1, 3]);

        Ok(points.matmul(a_t) + t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_affine_scale_and_shift() {
        let device = Default::default();
        let affine = AffineTransform::new(
            Matrix3::from_diagonal(&Vector3::new(2.0, 1.0, 1.0)),
            Vector3::new(0.0, 0.0, 5.0),
        );
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let out = Transform::<TestBackend>::transform_points(&affine, points).unwrap();
        assert_eq!(out.into_data().as_slice::<f32>().unwrap(), &[2.0, 2.0, 8.0]);
    }

    #[test]
    fn test_inverse_and_compose() {
        let shift = AffineTransform::translation(Vector3::new(1.0, -2.0, 3.0));
        let inv = shift.inverse().unwrap();
        assert_eq!(inv.compose(&shift), AffineTransform::identity());
        assert!(AffineTransform::from_matrix(Matrix4::zeros()).is_err());
    }
}
