//! Resample image filter.
//!
//! This module provides ResampleImageFilter which resamples a volume onto a
//! new grid through a transform and an interpolator.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Shape, Tensor};

use crate::error::Result;
use crate::image::{Geometry, Image};
use crate::interpolation::Interpolator;
use crate::transform::Transform;

/// Resample image filter.
///
/// Every output voxel is mapped to physical space, pushed through the
/// transform (output space -> input space), converted to a continuous index of
/// the input and interpolated. Samples that land outside the input grid (more
/// than half a voxel past the edge) take the default value.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `T` - The transform type
/// * `I` - The interpolator type
pub struct ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    size: [usize; 3],
    geometry: Geometry<3>,
    transform: T,
    interpolator: I,
    default_value: f32,
    _phantom: PhantomData<B>,
}

impl<B, T, I> ResampleImageFilter<B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    /// Create a new resample filter.
    ///
    /// # Arguments
    /// * `size` - Output grid shape `[Z, Y, X]`
    /// * `geometry` - Output grid geometry
    /// * `transform` - Transform from output space to input space
    /// * `interpolator` - Interpolator for input sampling
    pub fn new(size: [usize; 3], geometry: Geometry<3>, transform: T, interpolator: I) -> Self {
        Self {
            size,
            geometry,
            transform,
            interpolator,
            default_value: 0.0,
            _phantom: PhantomData,
        }
    }

    /// Create a filter whose output grid is that of `reference`.
    pub fn new_from_reference(reference: &Image<B, 3>, transform: T, interpolator: I) -> Self {
        Self::new(reference.shape(), *reference.geometry(), transform, interpolator)
    }

    /// Set the value used outside the input field of view.
    pub fn with_default_value(mut self, value: f32) -> Self {
        self.default_value = value;
        self
    }

    /// Apply the filter to an input volume.
    pub fn apply(&self, input: &Image<B, 3>) -> Result<Image<B, 3>> {
        let device = input.device();

        let output_indices = self.generate_grid_indices(&device);
        let output_points = self.geometry.index_to_world_tensor(output_indices);
        let input_points = self.transform.transform_points(output_points)?;
        let input_indices = input.world_to_index_tensor(input_points)?;

        let inside = Self::inside_mask(&input_indices, input.shape());
        let sampled = self.interpolator.interpolate(input.data(), input_indices)?;

        let values = if self.default_value == 0.0 {
            sampled * inside
        } else {
            let outside = inside.clone().neg().add_scalar(1.0);
            sampled * inside + outside.mul_scalar(self.default_value)
        };

        Ok(Image::new(values.reshape(Shape::new(self.size)), self.geometry))
    }

    /// 1.0 where the continuous index lies within the input grid, else 0.0.
    fn inside_mask(indices: &Tensor<B, 2>, shape: [usize; 3]) -> Tensor<B, 1> {
        let [d0, d1, d2] = shape; // Z, Y, X
        let extents = [d2, d1, d0];

        let mut mask = Tensor::ones([indices.dims()[0]], &indices.device());
        for (axis, &len) in extents.iter().enumerate() {
            let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
            let lower = coord.clone().greater_equal_elem(-0.5).float();
            let upper = coord.lower_equal_elem(len as f64 - 0.5).float();
            mask = mask * lower * upper;
        }
        mask
    }

    fn generate_grid_indices(&self, device: &B::Device) -> Tensor<B, 2> {
        let [d, h, w] = self.size;
        let n = d * h * w;

        let z_range = Tensor::<B, 1, Int>::arange(0..d as i64, device);
        let y_range = Tensor::<B, 1, Int>::arange(0..h as i64, device);
        let x_range = Tensor::<B, 1, Int>::arange(0..w as i64, device);

        let z_grid = z_range.reshape([d, 1, 1]).repeat(&[1, h, w]).reshape([n]).float();
        let y_grid = y_range.reshape([1, h, 1]).repeat(&[d, 1, w]).reshape([n]).float();
        let x_grid = x_range.reshape([1, 1, w]).repeat(&[d, h, 1]).reshape([n]).float();

        Tensor::cat(
            vec![x_grid.unsqueeze_dim(1), y_grid.unsqueeze_dim(1), z_grid.unsqueeze_dim(1)],
            1,
        )
    }
}
