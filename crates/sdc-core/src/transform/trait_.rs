//! Transform trait for spatial coordinate transformations.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;

/// Maps physical points from one space to another.
///
/// Resampling uses transforms in the pull direction: a point of the output
/// grid is mapped to the physical point of the input image that supplies its
/// value.
pub trait Transform<B: Backend> {
    /// Apply the transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, 3]` in `(x, y, z)` order
    ///
    /// # Returns
    /// Tensor of shape `[Batch, 3]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>>;
}
