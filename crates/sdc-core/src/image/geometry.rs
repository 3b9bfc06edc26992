//! Physical-space geometry shared by images and fields.
//!
//! A [`Geometry`] describes how image indices map to physical coordinates:
//! `point = origin + Direction * (index * spacing)`.
//! It always travels together with the array shape it describes.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::{Point, SMatrix, SVector};

use crate::error::{Result, SdcError};

/// Origin, spacing and orientation of a D-dimensional grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry<const D: usize> {
    /// Physical coordinate of the first voxel (index 0, 0, ...).
    origin: Point<f64, D>,
    /// Physical distance between voxels along each axis (mm).
    spacing: SVector<f64, D>,
    /// Column i is the direction of the i-th index axis in physical space.
    direction: SMatrix<f64, D, D>,
}

impl<const D: usize> Geometry<D> {
    /// Create a new geometry.
    pub fn new(origin: Point<f64, D>, spacing: SVector<f64, D>, direction: SMatrix<f64, D, D>) -> Self {
        Self {
            origin,
            spacing,
            direction,
        }
    }

    /// Zero origin, unit spacing, identity direction.
    pub fn identity() -> Self {
        Self {
            origin: Point::origin(),
            spacing: SVector::repeat(1.0),
            direction: SMatrix::identity(),
        }
    }

    /// Get the origin.
    pub fn origin(&self) -> &Point<f64, D> {
        &self.origin
    }

    /// Get the spacing.
    pub fn spacing(&self) -> &SVector<f64, D> {
        &self.spacing
    }

    /// Get the direction matrix.
    pub fn direction(&self) -> &SMatrix<f64, D, D> {
        &self.direction
    }

    pub fn with_origin(mut self, origin: Point<f64, D>) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_spacing(mut self, spacing: SVector<f64, D>) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_direction(mut self, direction: SMatrix<f64, D, D>) -> Self {
        self.direction = direction;
        self
    }

    /// Inverse of the direction matrix.
    pub fn inverse_direction(&self) -> Result<SMatrix<f64, D, D>> {
        self.direction
            .try_inverse()
            .ok_or_else(|| SdcError::degenerate_geometry("direction matrix is singular"))
    }

    /// Map a continuous index to a physical point.
    pub fn index_to_physical(&self, index: &Point<f64, D>) -> Point<f64, D> {
        let scaled = index.coords.component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// Map a physical point to a continuous index.
    ///
    /// `index = (Direction^-1 * (point - origin)) / spacing`
    pub fn physical_to_index(&self, point: &Point<f64, D>) -> Result<Point<f64, D>> {
        let inv_dir = self.inverse_direction()?;
        let rotated = inv_dir * (*point - self.origin);
        Ok(Point::from(rotated.component_div(&self.spacing)))
    }

    /// Batch version of [`Geometry::physical_to_index`] on a `[Batch, D]` tensor.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let device = points.device();
        let inv_dir = self.inverse_direction()?;

        // I = (P - O) @ T with T[r, c] = inv_dir[c, r] / spacing[c]
        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((inv_dir[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t_tensor = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);

        let diff = points - self.origin_tensor::<B>(&device);
        Ok(diff.matmul(t_tensor))
    }

    /// Batch version of [`Geometry::index_to_physical`] on a `[Batch, D]` tensor.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();

        // P = O + I @ M with M[r, c] = spacing[r] * direction[c, r]
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m_tensor = Tensor::<B, 2>::from_data(TensorData::new(m_data, Shape::new([D, D])), &device);

        indices.matmul(m_tensor) + self.origin_tensor::<B>(&device)
    }

    /// Whether two geometries describe the same grid placement.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.origin - other.origin).amax() <= tolerance
            && (self.spacing - other.spacing).amax() <= tolerance
            && (self.direction - other.direction).amax() <= tolerance
    }

    fn origin_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = self.origin.iter().map(|&v| v as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin, Shape::new([D])), device).reshape([1, D])
    }
}

impl<const D: usize> Default for Geometry<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl Geometry<4> {
    /// Extend a spatial geometry with a trailing volume axis of the given step.
    pub fn from_spatial(spatial: &Geometry<3>, volume_step: f64) -> Self {
        let o = spatial.origin();
        let s = spatial.spacing();
        let mut direction = SMatrix::<f64, 4, 4>::identity();
        direction
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(spatial.direction());
        Self {
            origin: Point::from([o[0], o[1], o[2], 0.0]),
            spacing: SVector::from([s[0], s[1], s[2], volume_step]),
            direction,
        }
    }

    /// The spatial part of a series geometry.
    pub fn spatial(&self) -> Geometry<3> {
        Geometry {
            origin: Point::from([self.origin[0], self.origin[1], self.origin[2]]),
            spacing: SVector::from([self.spacing[0], self.spacing[1], self.spacing[2]]),
            direction: self.direction.fixed_view::<3, 3>(0, 0).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_geometry_default() {
        let geometry = Geometry::<3>::default();
        assert_eq!(geometry.origin(), &Point::origin());
        assert_eq!(geometry.spacing(), &SVector::<f64, 3>::repeat(1.0));
        assert_eq!(geometry.direction(), &SMatrix::<f64, 3, 3>::identity());
    }

    #[test]
    fn test_index_physical_roundtrip() {
        let geometry = Geometry::<3>::identity()
            .with_origin(Point::from([10.0, -4.0, 2.5]))
            .with_spacing(SVector::from([2.0, 1.5, 3.0]));

        let index = Point::from([1.0, 2.0, 3.0]);
        let point = geometry.index_to_physical(&index);
        assert!((point[0] - 12.0).abs() < 1e-12);
        assert!((point[1] - -1.0).abs() < 1e-12);
        assert!((point[2] - 11.5).abs() < 1e-12);

        let back = geometry.physical_to_index(&point).unwrap();
        assert!((back - index).norm() < 1e-12);
    }

    #[test]
    fn test_tensor_mapping_matches_scalar() {
        let device = Default::default();
        let geometry = Geometry::<3>::identity()
            .with_origin(Point::from([1.0, 2.0, 3.0]))
            .with_spacing(SVector::from([2.0, 2.0, 4.0]));

        let indices = Tensor::<Backend, 2>::from_floats([[1.0, 1.0, 1.0]], &device);
        let points = geometry.index_to_world_tensor(indices);
        let data = points.clone().into_data();
        let slice = data.as_slice::<f32>().unwrap();
        assert_eq!(slice, &[3.0, 4.0, 7.0]);

        let back = geometry.world_to_index_tensor(points).unwrap().into_data();
        let slice = back.as_slice::<f32>().unwrap();
        for v in slice {
            assert!((v - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_singular_direction_rejected() {
        let geometry = Geometry::<3>::identity().with_direction(SMatrix::zeros());
        assert!(geometry.physical_to_index(&Point::origin()).is_err());
    }

    #[test]
    fn test_series_geometry_keeps_spatial_part() {
        let spatial = Geometry::<3>::identity().with_spacing(SVector::from([1.0, 2.0, 3.0]));
        let series = Geometry::<4>::from_spatial(&spatial, 1.0);
        assert_eq!(series.spatial(), spatial);
        assert_eq!(series.spacing()[3], 1.0);
    }
}
