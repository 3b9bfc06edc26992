//! Interpolator trait for sampling values at continuous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;

/// Interpolator trait for sampling volume values at continuous indices.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate values from a volume at given continuous indices.
    ///
    /// # Arguments
    /// * `data` - The source volume `[Z, Y, X]`
    /// * `indices` - Continuous indices `[Batch, 3]` in `(x, y, z)` order
    ///
    /// # Returns
    /// Tensor of sampled values `[Batch]`. Indices outside the grid sample the
    /// nearest edge voxel; callers decide what lies outside the field of view.
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>>;
}
