//! Dense displacement field as a transform.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Transform;
use crate::error::Result;
use crate::field::DisplacementField;
use crate::interpolation::{Interpolator, LinearInterpolator};

/// `T(p) = p + u(p)`, with `u` sampled trilinearly on the field grid.
///
/// Points outside the field grid take the displacement of the nearest edge
/// voxel.
impl<B: Backend> Transform<B> for DisplacementField<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let indices = self.geometry().world_to_index_tensor(points.clone())?;
        let interpolator = LinearInterpolator::new();

        let mut columns = Vec::with_capacity(3);
        for axis in 0..3 {
            let component = self.component(axis)?;
            columns.push(interpolator.interpolate(&component, indices.clone())?);
        }
        let displacement = Tensor::stack::<2>(columns, 1);

        Ok(points + displacement)
    }
}
