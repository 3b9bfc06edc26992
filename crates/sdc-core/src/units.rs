//! Pure numeric units used by the correction pipelines.
//!
//! Every unit returns a new image; inputs are never edited. Derived images
//! keep the geometry of the image they were computed from.

use std::f64::consts::PI;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{Result, SdcError};
use crate::field::{DisplacementField, VoxelShiftMap};
use crate::image::{Geometry, Image, Series};
use crate::phase_encoding::PhaseEncodingDirection;

/// Convert a fieldmap from Hz to rad/s (multiply by 2π).
pub fn hz_to_rad_per_sec<B: Backend, const D: usize>(field: &Image<B, D>) -> Image<B, D> {
    Image::new(field.data().clone().mul_scalar(2.0 * PI), *field.geometry())
}

/// Median with numpy semantics: the mean of the two middle values for even
/// counts. `None` for an empty slice.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of `image` over voxels where `mask > 0`.
pub fn masked_median<B: Backend>(image: &Image<B, 3>, mask: &Image<B, 3>) -> Result<f32> {
    image.ensure_same_shape(mask)?;
    let values = image.values()?;
    let selected: Vec<f32> = values
        .into_iter()
        .zip(mask.values()?)
        .filter(|&(_, m)| m > 0.0)
        .map(|(v, _)| v)
        .collect();
    median(&selected).ok_or(SdcError::EmptyMask)
}

/// Subtract the in-mask median from every voxel of `field`.
///
/// Voxels outside the mask shift by the same constant. An empty mask is an
/// error, not a no-op.
pub fn demean<B: Backend>(field: &Image<B, 3>, mask: &Image<B, 3>) -> Result<Image<B, 3>> {
    let center = masked_median(field, mask)?;
    tracing::debug!(median = center, "demeaning shift map");
    field.with_data(field.data().clone().sub_scalar(center))
}

/// An image of ones on the grid of `reference`.
pub fn fill_with_ones<B: Backend, const D: usize>(reference: &Image<B, D>) -> Image<B, D> {
    let data = Tensor::ones(reference.shape(), &reference.device());
    Image::new(data, *reference.geometry())
}

/// Zero every voxel where `mask <= 0`.
pub fn apply_mask<B: Backend>(image: &Image<B, 3>, mask: &Image<B, 3>) -> Result<Image<B, 3>> {
    image.ensure_same_shape(mask)?;
    let keep = mask.data().clone().greater_elem(0.0).float();
    image.with_data(image.data().clone() * keep)
}

/// Voxel-wise product of two images on the same grid.
pub fn multiply<B: Backend>(image: &Image<B, 3>, operand: &Image<B, 3>) -> Result<Image<B, 3>> {
    image.ensure_same_shape(operand)?;
    image.with_data(image.data().clone() * operand.data().clone())
}

/// Stack volumes along a new leading axis, in order.
pub fn concatenate<B: Backend>(volumes: &[Image<B, 3>]) -> Result<Series<B>> {
    Series::from_volumes(volumes)
}

/// The first element of a list.
pub fn pick_first<T: Clone>(items: &[T]) -> Result<T> {
    items
        .first()
        .cloned()
        .ok_or_else(|| SdcError::EmptySequence("pick_first on an empty list".into()))
}

/// `data` with the geometry of `header_source`. Shapes must agree.
pub fn copy_header<B: Backend>(header_source: &Image<B, 3>, data: &Image<B, 3>) -> Result<Image<B, 3>> {
    header_source.ensure_same_shape(data)?;
    Ok(data.with_geometry(*header_source.geometry()))
}

/// Series variant of [`copy_header`]: the spatial geometry of `header_source`
/// replaces that of every volume; the volume step is kept.
pub fn copy_header_series<B: Backend>(header_source: &Image<B, 3>, data: &Series<B>) -> Result<Series<B>> {
    let spatial = header_source.shape();
    let volume = data.volume_shape();
    if spatial != volume {
        return Err(SdcError::shape_mismatch(&spatial, &volume));
    }
    let step = data.geometry().spacing()[3];
    Ok(data.with_geometry(Geometry::from_spatial(header_source.geometry(), step)))
}

/// Turn a voxel-shift map into a physical displacement field.
///
/// The shift is scaled by the voxel spacing along the phase-encoding axis,
/// sign-flipped for negative polarity and laid along that axis' direction
/// cosine. With an identity direction matrix this is the PE component alone;
/// the other two components are zero.
pub fn shift_to_displacement_field<B: Backend>(
    vsm: &VoxelShiftMap<B>,
    pe: PhaseEncodingDirection,
) -> Result<DisplacementField<B>> {
    let image = vsm.image();
    let geometry = image.geometry();
    let axis = pe.axis().index();
    let scale = geometry.spacing()[axis] * pe.sign();
    let direction = geometry.direction().column(axis).into_owned();

    let components: Vec<Tensor<B, 3>> = (0..3)
        .map(|c| {
            let weight = scale * direction[c];
            if weight == 0.0 {
                Tensor::zeros(image.shape(), &image.device())
            } else {
                image.data().clone().mul_scalar(weight)
            }
        })
        .collect();

    DisplacementField::new(Tensor::stack::<4>(components, 0), *geometry)
}

/// Mark a displacement estimate as a per-voxel vector field.
///
/// A three-volume stack is read as the `(x, y, z)` components. A single-volume
/// stack is a scalar displacement (mm) placed in `component`, with the other
/// components zero.
pub fn promote_to_vector_field<B: Backend>(stack: &Series<B>, component: usize) -> Result<DisplacementField<B>> {
    let geometry = stack.geometry().spatial();
    match stack.num_volumes() {
        3 => DisplacementField::new(stack.data().clone(), geometry),
        1 => {
            if component > 2 {
                return Err(SdcError::invalid_argument(format!("no vector component {component}")));
            }
            let scalar = stack.volume(0)?;
            let zeros = Image::new(Tensor::zeros(scalar.shape(), &scalar.device()), geometry);
            let mut parts = [zeros.clone(), zeros.clone(), zeros];
            parts[component] = scalar;
            DisplacementField::from_component_images(parts)
        }
        n => Err(SdcError::invalid_argument(format!(
            "cannot promote a stack of {n} volumes to a vector field"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::{Matrix3, Vector3};

    type TestBackend = NdArray<f32>;

    fn image(values: Vec<f32>, shape: [usize; 3]) -> Image<TestBackend, 3> {
        let geometry = Geometry::identity().with_spacing(Vector3::new(2.0, 2.5, 3.0));
        Image::from_values(values, shape, geometry, &Default::default()).unwrap()
    }

    #[test]
    fn test_median_numpy_semantics() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_hz_to_rad_per_sec() {
        let field = image(vec![0.0, 1.0, -2.0, 0.5], [1, 2, 2]);
        let out = hz_to_rad_per_sec(&field);
        let expected: Vec<f32> = [0.0, 1.0, -2.0, 0.5].iter().map(|v| v * 2.0 * std::f32::consts::PI).collect();
        for (a, b) in out.values().unwrap().iter().zip(expected) {
            assert!((a - b).abs() < 1e-5);
        }
        assert_eq!(out.geometry(), field.geometry());
    }

    #[test]
    fn test_demean_centers_masked_median() {
        let field = image(vec![1.0, 2.0, 3.0, 100.0], [1, 2, 2]);
        let mask = image(vec![1.0, 1.0, 1.0, 0.0], [1, 2, 2]);
        let out = demean(&field, &mask).unwrap();
        assert_eq!(out.values().unwrap(), vec![-1.0, 0.0, 1.0, 98.0]);
    }

    #[test]
    fn test_demean_empty_mask_fails() {
        let field = image(vec![1.0; 4], [1, 2, 2]);
        let mask = image(vec![0.0; 4], [1, 2, 2]);
        assert_eq!(demean(&field, &mask).unwrap_err(), SdcError::EmptyMask);
    }

    #[test]
    fn test_fill_with_ones_keeps_grid() {
        let reference = image(vec![5.0; 8], [2, 2, 2]);
        let ones = fill_with_ones(&reference);
        assert_eq!(ones.values().unwrap(), vec![1.0; 8]);
        assert!(ones.same_grid(&reference, 0.0));
    }

    #[test]
    fn test_apply_mask_and_multiply() {
        let a = image(vec![1.0, 2.0, 3.0, 4.0], [1, 2, 2]);
        let m = image(vec![1.0, 0.0, -1.0, 0.5], [1, 2, 2]);
        assert_eq!(apply_mask(&a, &m).unwrap().values().unwrap(), vec![1.0, 0.0, 0.0, 4.0]);
        assert_eq!(multiply(&a, &m).unwrap().values().unwrap(), vec![1.0, 0.0, -3.0, 2.0]);

        let wrong = image(vec![1.0; 8], [2, 2, 2]);
        assert!(matches!(apply_mask(&a, &wrong), Err(SdcError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_pick_first() {
        assert_eq!(pick_first(&[3, 4]).unwrap(), 3);
        assert!(matches!(pick_first::<i32>(&[]), Err(SdcError::EmptySequence(_))));
    }

    #[test]
    fn test_shift_to_displacement_field_scales_and_flips() {
        let vsm = VoxelShiftMap::new(image(vec![1.0, -2.0], [1, 1, 2]));
        let pe = PhaseEncodingDirection::parse("j-").unwrap();
        let field = shift_to_displacement_field(&vsm, pe).unwrap();

        assert_eq!(field.component_image(0).unwrap().values().unwrap(), vec![0.0, 0.0]);
        assert_eq!(field.component_image(1).unwrap().values().unwrap(), vec![-2.5, 5.0]);
        assert_eq!(field.component_image(2).unwrap().values().unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_shift_follows_direction_cosines() {
        // Voxel axis j points along physical -x.
        let direction = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let geometry = Geometry::identity().with_direction(direction);
        let vsm = VoxelShiftMap::new(Image::<TestBackend, 3>::from_values(vec![2.0], [1, 1, 1], geometry, &Default::default()).unwrap());
        let field = shift_to_displacement_field(&vsm, PhaseEncodingDirection::parse("j").unwrap()).unwrap();
        assert_eq!(field.values().unwrap(), vec![-2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_promote_to_vector_field() {
        let three = Series::<TestBackend>::from_volumes(&[
            image(vec![1.0; 2], [1, 1, 2]),
            image(vec![2.0; 2], [1, 1, 2]),
            image(vec![3.0; 2], [1, 1, 2]),
        ])
        .unwrap();
        let field = promote_to_vector_field(&three, 0).unwrap();
        assert_eq!(field.values().unwrap(), vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(field.geometry().spacing(), &Vector3::new(2.0, 2.5, 3.0));

        let one = Series::<TestBackend>::from_volumes(&[image(vec![4.0; 2], [1, 1, 2])]).unwrap();
        let field = promote_to_vector_field(&one, 1).unwrap();
        assert_eq!(field.values().unwrap(), vec![0.0, 0.0, 4.0, 4.0, 0.0, 0.0]);

        let two = Series::<TestBackend>::from_volumes(&[image(vec![0.0; 2], [1, 1, 2]), image(vec![0.0; 2], [1, 1, 2])])
            .unwrap();
        assert!(promote_to_vector_field(&two, 0).is_err());
    }

    #[test]
    fn test_copy_header_series_keeps_step() {
        let device = Default::default();
        let source = image(vec![0.0; 2], [1, 1, 2]);
        let data = Series::<TestBackend>::from_volumes(&[Image::from_values(vec![7.0; 2], [1, 1, 2], Geometry::identity(), &device).unwrap()])
            .unwrap();
        let repaired = copy_header_series(&source, &data).unwrap();
        assert_eq!(repaired.geometry().spatial(), *source.geometry());
        assert_eq!(repaired.values().unwrap(), vec![7.0; 2]);

        let mismatched = image(vec![0.0; 4], [1, 2, 2]);
        assert!(copy_header(&mismatched, &source).is_err());
    }
}
