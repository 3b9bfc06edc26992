//! Image type with physical metadata.
//!
//! This module provides the Image struct which represents a volume as tensor
//! data plus the physical-space [`Geometry`] of its grid.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::Point;

use super::geometry::Geometry;
use crate::error::{Result, SdcError};

/// Image with physical metadata.
///
/// The shape of `data` and `geometry` always travel together. Operations in
/// this crate never edit an image in place: derived images are built with
/// [`Image::with_data`], which keeps the geometry of the parent.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The dimensionality of the image (3 for volumes, 4 for series)
///
/// # Layout
/// Tensor dimensions run slowest to fastest, `[Z, Y, X]` for volumes and
/// `[T, Z, Y, X]` for series. Continuous indices are written `(x, y, z[, t])`.
///
/// # Examples
/// ```rust
/// use sdc_core::image::{Geometry, Image};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(data, Geometry::identity());
/// assert_eq!(image.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    geometry: Geometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and geometry.
    pub fn new(data: Tensor<B, D>, geometry: Geometry<D>) -> Self {
        Self { data, geometry }
    }

    /// Build an image from host values laid out in tensor order.
    pub fn from_values(
        values: Vec<f32>,
        shape: [usize; D],
        geometry: Geometry<D>,
        device: &B::Device,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(SdcError::tensor_data(format!(
                "{} values cannot fill shape {:?}",
                values.len(),
                shape
            )));
        }
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(shape)), device);
        Ok(Self::new(data, geometry))
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Consume the image, returning its data tensor.
    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    /// Get the grid geometry.
    pub fn geometry(&self) -> &Geometry<D> {
        &self.geometry
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Number of voxels.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether the image has no voxels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Read the voxel values back to the host, in tensor order.
    pub fn values(&self) -> Result<Vec<f32>> {
        self.data
            .to_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| SdcError::tensor_data(format!("{e:?}")))
    }

    /// A derived image on the same grid.
    pub fn with_data(&self, data: Tensor<B, D>) -> Result<Self> {
        let shape = data.dims();
        if shape != self.shape() {
            return Err(SdcError::shape_mismatch(&self.shape(), &shape));
        }
        Ok(Self::new(data, self.geometry))
    }

    /// A derived image on the same grid from host values.
    pub fn with_values(&self, values: Vec<f32>) -> Result<Self> {
        Self::from_values(values, self.shape(), self.geometry, &self.device())
    }

    /// The same data with a different geometry.
    pub fn with_geometry(&self, geometry: Geometry<D>) -> Self {
        Self::new(self.data.clone(), geometry)
    }

    /// Fail unless `other` has the same array shape.
    pub fn ensure_same_shape<const E: usize>(&self, other: &Image<B, E>) -> Result<()> {
        let (a, b) = (self.shape(), other.shape());
        if a.as_slice() != b.as_slice() {
            return Err(SdcError::shape_mismatch(&a, &b));
        }
        Ok(())
    }

    /// Whether `other` lives on the same grid (shape and geometry).
    pub fn same_grid(&self, other: &Self, tolerance: f64) -> bool {
        self.shape() == other.shape() && self.geometry.approx_eq(&other.geometry, tolerance)
    }

    /// Convert a continuous physical point to a continuous index.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<f64, D>) -> Result<Point<f64, D>> {
        self.geometry.physical_to_index(point)
    }

    /// Convert a continuous index to a physical point.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<f64, D>) -> Point<f64, D> {
        self.geometry.index_to_physical(index)
    }

    /// Batch transform `[Batch, D]` physical points to continuous indices.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        self.geometry.world_to_index_tensor(points)
    }

    /// Batch transform `[Batch, D]` continuous indices to physical points.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        self.geometry.index_to_world_tensor(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::SVector;

    type Backend = NdArray<f32>;

    #[test]
    fn test_image_creation() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([4, 5, 6], &device);
        let image = Image::new(data, Geometry::identity());

        assert_eq!(image.shape(), [4, 5, 6]);
        assert_eq!(image.len(), 120);
        assert_eq!(image.geometry(), &Geometry::identity());
    }

    #[test]
    fn test_from_values_checks_length() {
        let device = Default::default();
        let result = Image::<Backend, 3>::from_values(vec![0.0; 7], [2, 2, 2], Geometry::identity(), &device);
        assert!(matches!(result, Err(SdcError::TensorData(_))));
    }

    #[test]
    fn test_with_data_keeps_geometry() {
        let device = Default::default();
        let geometry = Geometry::identity().with_spacing(SVector::from([2.0, 2.0, 2.0]));
        let image = Image::<Backend, 3>::from_values(vec![1.0; 8], [2, 2, 2], geometry, &device).unwrap();

        let derived = image.with_data(image.data().clone().mul_scalar(3.0)).unwrap();
        assert_eq!(derived.geometry(), &geometry);
        assert_eq!(derived.values().unwrap(), vec![3.0; 8]);

        let wrong = Tensor::<Backend, 3>::zeros([2, 2, 3], &device);
        assert!(image.with_data(wrong).is_err());
    }

    #[test]
    fn test_non_unit_spacing() {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
        let geometry = Geometry::identity().with_spacing(SVector::from([2.0, 2.0, 2.0]));
        let image = Image::new(data, geometry);

        let point = Point::from([10.0, 10.0, 10.0]);
        let index = image.transform_physical_point_to_continuous_index(&point).unwrap();

        assert!((index[0] - 5.0).abs() < 1e-6);
        assert!((index[1] - 5.0).abs() < 1e-6);
        assert!((index[2] - 5.0).abs() < 1e-6);
    }
}
