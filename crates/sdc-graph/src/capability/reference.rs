//! Reference implementations for capabilities that are plain numeric
//! operations.

use burn::tensor::backend::Backend;

use super::{FieldmapUnwarp, HeaderRepair, Resampled, TransformApplier};
use crate::value::Report;
use sdc_core::filter::ResampleImageFilter;
use sdc_core::vsm::fieldmap_to_shift;
use sdc_core::{units, CompositeTransform, Image, Interpolation, PhaseEncodingDirection, Series, VoxelShiftMap};

/// Header repair by geometry copy. Array shapes must agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyHeader;

impl<B: Backend> HeaderRepair<B> for CopyHeader {
    fn repair(&self, header: &Image<B, 3>, data: &Image<B, 3>) -> anyhow::Result<Image<B, 3>> {
        Ok(units::copy_header(header, data)?)
    }

    fn repair_series(&self, header: &Image<B, 3>, data: &Series<B>) -> anyhow::Result<Series<B>> {
        Ok(units::copy_header_series(header, data)?)
    }
}

/// Transform application through [`ResampleImageFilter`], zero outside the
/// input field of view.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResamplingApplier;

impl<B: Backend> TransformApplier<B> for ResamplingApplier {
    fn apply(
        &self,
        transform: &CompositeTransform<B>,
        reference: &Image<B, 3>,
        input: &Image<B, 3>,
        interpolation: Interpolation,
    ) -> anyhow::Result<Resampled<B>> {
        let filter = ResampleImageFilter::new_from_reference(reference, transform.clone(), interpolation);
        let image = filter.apply(input)?;

        let report = Report::new("resampling")
            .line(format!("interpolation: {interpolation}"))
            .line(format!("transform parts: {}", transform.len()))
            .line(format!("input grid: {:?}", input.shape()))
            .line(format!("output grid: {:?}", image.shape()));
        Ok(Resampled { image, report })
    }
}

/// Voxel shifts from the phase-encoding bandwidth relation, see
/// [`fieldmap_to_shift`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldmapShiftEstimator;

impl<B: Backend> FieldmapUnwarp<B> for FieldmapShiftEstimator {
    fn estimate(
        &self,
        fieldmap: &Image<B, 3>,
        dwell_time: f64,
        pe: PhaseEncodingDirection,
        mask: Option<&Image<B, 3>>,
    ) -> anyhow::Result<VoxelShiftMap<B>> {
        Ok(fieldmap_to_shift(fieldmap, dwell_time, pe, mask)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::Vector3;
    use sdc_core::{AffineTransform, Geometry};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_copy_header_moves_geometry() {
        let device = Default::default();
        let header = Image::<TestBackend, 3>::from_values(
            vec![0.0; 8],
            [2, 2, 2],
            Geometry::identity().with_spacing(Vector3::new(3.0, 3.0, 3.0)),
            &device,
        )
        .unwrap();
        let data = Image::<TestBackend, 3>::from_values(vec![5.0; 8], [2, 2, 2], Geometry::identity(), &device).unwrap();

        let repaired = CopyHeader.repair(&header, &data).unwrap();
        assert_eq!(repaired.geometry(), header.geometry());
        assert_eq!(repaired.values().unwrap(), vec![5.0; 8]);
    }

    #[test]
    fn test_resampling_applier_reports() {
        let device = Default::default();
        let image = Image::<TestBackend, 3>::from_values(vec![2.0; 27], [3, 3, 3], Geometry::identity(), &device).unwrap();
        let transform = CompositeTransform::identity().then(AffineTransform::identity());

        let out = ResamplingApplier
            .apply(&transform, &image, &image, Interpolation::NearestNeighbor)
            .unwrap();
        assert_eq!(out.image.values().unwrap(), vec![2.0; 27]);
        assert_eq!(out.report.lines[0], "interpolation: NearestNeighbor");
    }
}
