//! Volume series (4D images).
//!
//! A series stacks co-registered volumes along a leading axis, giving a tensor
//! layout of `[T, Z, Y, X]`.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::geometry::Geometry;
use super::image::Image;
use crate::error::{Result, SdcError};

/// Alias for a stack of 3D volumes.
pub type Series<B> = Image<B, 4>;

impl<B: Backend> Image<B, 4> {
    /// Stack volumes along a new leading axis, preserving order.
    ///
    /// All volumes must share the shape of the first one, whose spatial
    /// geometry is kept.
    pub fn from_volumes(volumes: &[Image<B, 3>]) -> Result<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| SdcError::EmptySequence("no volumes to concatenate".into()))?;
        let shape = first.shape();
        for volume in &volumes[1..] {
            if volume.shape() != shape {
                return Err(SdcError::shape_mismatch(&shape, &volume.shape()));
            }
        }

        let stacked = Tensor::cat(
            volumes
                .iter()
                .map(|v| v.data().clone().unsqueeze_dim::<4>(0))
                .collect(),
            0,
        );
        Ok(Image::new(stacked, Geometry::from_spatial(first.geometry(), 1.0)))
    }

    /// Number of volumes in the series.
    pub fn num_volumes(&self) -> usize {
        self.shape()[0]
    }

    /// Spatial shape `[Z, Y, X]` of each volume.
    pub fn volume_shape(&self) -> [usize; 3] {
        let [_, z, y, x] = self.shape();
        [z, y, x]
    }

    /// Extract one volume with the spatial geometry of the series.
    pub fn volume(&self, index: usize) -> Result<Image<B, 3>> {
        let [t, z, y, x] = self.shape();
        if index >= t {
            return Err(SdcError::invalid_argument(format!(
                "volume {index} out of range for a series of {t}"
            )));
        }
        let data = self
            .data()
            .clone()
            .slice([index..index + 1, 0..z, 0..y, 0..x])
            .reshape([z, y, x]);
        Ok(Image::new(data, self.geometry().spatial()))
    }

    /// Split the series back into volumes.
    pub fn volumes(&self) -> Result<Vec<Image<B, 3>>> {
        (0..self.num_volumes()).map(|i| self.volume(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::SVector;

    type Backend = NdArray<f32>;

    #[test]
    fn test_stack_and_split_preserves_order() {
        let device = Default::default();
        let geometry = Geometry::identity().with_spacing(SVector::from([2.0, 2.0, 3.0]));
        let volumes: Vec<_> = (0..3)
            .map(|i| Image::<Backend, 3>::from_values(vec![i as f32; 8], [2, 2, 2], geometry, &device).unwrap())
            .collect();

        let series = Series::from_volumes(&volumes).unwrap();
        assert_eq!(series.shape(), [3, 2, 2, 2]);
        assert_eq!(series.geometry().spatial(), geometry);

        for (i, volume) in series.volumes().unwrap().iter().enumerate() {
            assert_eq!(volume.values().unwrap(), vec![i as f32; 8]);
            assert_eq!(volume.geometry(), &geometry);
        }
    }

    #[test]
    fn test_stack_rejects_mixed_shapes() {
        let device = Default::default();
        let a = Image::<Backend, 3>::from_values(vec![0.0; 8], [2, 2, 2], Geometry::identity(), &device).unwrap();
        let b = Image::<Backend, 3>::from_values(vec![0.0; 12], [3, 2, 2], Geometry::identity(), &device).unwrap();
        assert!(Series::from_volumes(&[a, b]).is_err());
        assert!(Series::<Backend>::from_volumes(&[]).is_err());
    }
}
