//! Displacement fields and voxel-shift maps.
//!
//! A [`VoxelShiftMap`] is a scalar volume of shifts in voxels along a single
//! axis. A [`DisplacementField`] holds one physical 3-vector (mm) per voxel
//! and is what resampling consumes.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{Result, SdcError};
use crate::image::{Geometry, Image, Series};

/// Dense displacement field on a reference grid.
///
/// Components are stored as `[3, Z, Y, X]` in `(x, y, z)` physical order.
/// The grid shape and geometry equal those of the image it displaces.
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend> {
    components: Tensor<B, 4>,
    geometry: Geometry<3>,
}

impl<B: Backend> DisplacementField<B> {
    /// Create a field from a `[3, Z, Y, X]` component tensor.
    pub fn new(components: Tensor<B, 4>, geometry: Geometry<3>) -> Result<Self> {
        let dims = components.dims();
        if dims[0] != 3 {
            return Err(SdcError::invalid_argument(format!(
                "displacement field needs 3 components, got {}",
                dims[0]
            )));
        }
        Ok(Self { components, geometry })
    }

    /// A zero field on the grid of `reference`.
    pub fn zeros_like(reference: &Image<B, 3>) -> Self {
        let [z, y, x] = reference.shape();
        Self {
            components: Tensor::zeros([3, z, y, x], &reference.device()),
            geometry: *reference.geometry(),
        }
    }

    /// Stack three scalar volumes (x, y, z displacement) into a field.
    pub fn from_component_images(components: [Image<B, 3>; 3]) -> Result<Self> {
        let [cx, cy, cz] = components;
        cx.ensure_same_shape(&cy)?;
        cx.ensure_same_shape(&cz)?;
        let geometry = *cx.geometry();
        let stacked = Tensor::stack::<4>(vec![cx.into_data(), cy.into_data(), cz.into_data()], 0);
        Self::new(stacked, geometry)
    }

    /// Component tensor `[3, Z, Y, X]`.
    pub fn components(&self) -> &Tensor<B, 4> {
        &self.components
    }

    pub fn geometry(&self) -> &Geometry<3> {
        &self.geometry
    }

    /// Grid shape `[Z, Y, X]`.
    pub fn shape(&self) -> [usize; 3] {
        let [_, z, y, x] = self.components.dims();
        [z, y, x]
    }

    pub fn device(&self) -> B::Device {
        self.components.device()
    }

    /// One displacement component (0 = x, 1 = y, 2 = z) as a volume tensor.
    pub fn component(&self, axis: usize) -> Result<Tensor<B, 3>> {
        if axis > 2 {
            return Err(SdcError::invalid_argument(format!("no displacement component {axis}")));
        }
        let [z, y, x] = self.shape();
        Ok(self
            .components
            .clone()
            .slice([axis..axis + 1, 0..z, 0..y, 0..x])
            .reshape([z, y, x]))
    }

    /// One displacement component as an image on the field grid.
    pub fn component_image(&self, axis: usize) -> Result<Image<B, 3>> {
        Ok(Image::new(self.component(axis)?, self.geometry))
    }

    /// Host copy of all components, component-major.
    pub fn values(&self) -> Result<Vec<f32>> {
        self.components
            .to_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| SdcError::tensor_data(format!("{e:?}")))
    }

    /// Largest absolute displacement over all components.
    pub fn max_abs(&self) -> Result<f32> {
        Ok(self.values()?.iter().fold(0.0f32, |m, v| m.max(v.abs())))
    }

    /// The field viewed as a three-volume series (component axis first).
    pub fn to_series(&self) -> Series<B> {
        Image::new(self.components.clone(), Geometry::from_spatial(&self.geometry, 1.0))
    }

    /// Whether the field lives on the grid of `image`.
    pub fn matches_grid(&self, image: &Image<B, 3>, tolerance: f64) -> bool {
        self.shape() == image.shape() && self.geometry.approx_eq(image.geometry(), tolerance)
    }
}

/// Per-voxel shift, in voxels, along the phase-encoding axis.
///
/// Not yet a displacement field: it carries no axis or polarity of its own.
#[derive(Debug, Clone)]
pub struct VoxelShiftMap<B: Backend>(Image<B, 3>);

impl<B: Backend> VoxelShiftMap<B> {
    pub fn new(image: Image<B, 3>) -> Self {
        Self(image)
    }

    pub fn image(&self) -> &Image<B, 3> {
        &self.0
    }

    pub fn into_image(self) -> Image<B, 3> {
        self.0
    }

    pub fn values(&self) -> Result<Vec<f32>> {
        self.0.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_field_rejects_wrong_component_count() {
        let device = Default::default();
        let components = Tensor::<TestBackend, 4>::zeros([2, 4, 4, 4], &device);
        assert!(DisplacementField::new(components, Geometry::identity()).is_err());
    }

    #[test]
    fn test_component_images_roundtrip() {
        let device = Default::default();
        let make = |v: f32| {
            Image::<TestBackend, 3>::from_values(vec![v; 8], [2, 2, 2], Geometry::identity(), &device).unwrap()
        };
        let field = DisplacementField::from_component_images([make(1.0), make(2.0), make(3.0)]).unwrap();

        assert_eq!(field.shape(), [2, 2, 2]);
        assert_eq!(field.component_image(1).unwrap().values().unwrap(), vec![2.0; 8]);
        assert_eq!(field.max_abs().unwrap(), 3.0);
        assert!(field.component(3).is_err());
    }
}
