//! Stand-in capabilities for running the correction workflows end to end.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use burn_ndarray::NdArray;
use sdc_core::{AcquisitionTable, CompositeTransform, Geometry, Image, Series, SidecarMetadata};
use sdc_graph::capability::{
    BiasFieldCorrector, BlipPairEstimator, BlipPairOutput, ImageReader, MaskEstimator, MaskOutput, MetadataReader,
    Registration, RegistrationOutput,
};
use sdc_graph::{RegistrationPreset, Report};

pub type Backend = NdArray<f32>;

pub fn volume(shape: [usize; 3], value: impl Fn(usize) -> f32) -> Image<Backend, 3> {
    let n: usize = shape.iter().product();
    Image::from_values((0..n).map(value).collect(), shape, Geometry::identity(), &Default::default()).unwrap()
}

/// Positive, non-constant intensities.
pub fn reference(shape: [usize; 3]) -> Image<Backend, 3> {
    volume(shape, |i| (i % 7) as f32 + 1.0)
}

/// Reference volumes read `name_source` as phase-encoded along `j`; every
/// other identifier is read as `j-`.
pub struct SidecarStub {
    pub name_source: String,
}

impl MetadataReader for SidecarStub {
    fn read(&self, source: &str) -> anyhow::Result<SidecarMetadata> {
        let pe = if source == self.name_source { "j" } else { "j-" };
        Ok(SidecarMetadata::default()
            .with_phase_encoding_direction(pe)
            .with_effective_echo_spacing(0.00058)
            .with_total_readout_time(0.0425))
    }
}

/// Every path reads as the same volume.
pub struct ConstantReader {
    pub shape: [usize; 3],
}

impl ImageReader<Backend> for ConstantReader {
    fn read(&self, path: &Path) -> anyhow::Result<Image<Backend, 3>> {
        anyhow::ensure!(path.is_absolute(), "expected a resolved path, got {}", path.display());
        Ok(reference(self.shape))
    }
}

/// Assumes the images are already aligned.
pub struct IdentityRegistration;

impl Registration<Backend> for IdentityRegistration {
    fn register(
        &self,
        moving: &Image<Backend, 3>,
        _fixed: &Image<Backend, 3>,
        preset: RegistrationPreset,
    ) -> anyhow::Result<RegistrationOutput<Backend>> {
        Ok(RegistrationOutput {
            transform: CompositeTransform::identity(),
            warped: moving.clone(),
            report: Report::new("registration").line(format!("preset: {preset}")),
        })
    }
}

/// Everything above zero is brain.
pub struct ThresholdMask;

impl MaskEstimator<Backend> for ThresholdMask {
    fn estimate(&self, image: &Image<Backend, 3>) -> anyhow::Result<MaskOutput<Backend>> {
        let mask = image.with_data(image.data().clone().greater_elem(0.0).float())?;
        Ok(MaskOutput {
            mask,
            report: Report::new("brain mask"),
        })
    }
}

pub struct NoBias;

impl BiasFieldCorrector<Backend> for NoBias {
    fn correct(&self, image: &Image<Backend, 3>) -> anyhow::Result<Image<Backend, 3>> {
        Ok(image.clone())
    }
}

/// Reports no distortion when all merged volumes are identical, and keeps
/// the acquisition table it was given.
#[derive(Clone, Default)]
pub struct IdenticalVolumesEstimator {
    pub tables: Arc<Mutex<Vec<AcquisitionTable>>>,
}

impl BlipPairEstimator<Backend> for IdenticalVolumesEstimator {
    fn estimate(&self, volumes: &Series<Backend>, table: &AcquisitionTable) -> anyhow::Result<BlipPairOutput<Backend>> {
        self.tables
            .lock()
            .map_err(|_| anyhow::anyhow!("table log poisoned"))?
            .push(table.clone());

        let all = volumes.volumes()?;
        let first = all[0].values()?;
        for other in &all[1..] {
            anyhow::ensure!(other.values()? == first, "volumes differ");
        }

        let zeros = all[0].with_values(vec![0.0; first.len()])?;
        let ones = all[0].with_values(vec![1.0; first.len()])?;
        let field = Series::from_volumes(&[zeros.clone(), zeros.clone(), zeros])?;
        Ok(BlipPairOutput {
            fields: vec![field; all.len()],
            jacobians: vec![ones; all.len()],
        })
    }
}
