//! Capability seams: operations the graph invokes but does not implement.
//!
//! Each trait returns `anyhow::Result` so failures from external tools keep
//! their own context; the executor wraps them with the failing node's name.
//! [`Capabilities`] bundles the bound implementations.

mod reference;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::value::Report;
use sdc_core::{
    AcquisitionTable, CompositeTransform, Image, Interpolation, PhaseEncodingDirection, Series, SidecarMetadata,
    VoxelShiftMap,
};

pub use reference::{CopyHeader, FieldmapShiftEstimator, ResamplingApplier};

/// Registration settings bundle.
///
/// `Testing` trades accuracy for speed and is meant for test suites and
/// smoke runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPreset {
    #[default]
    Standard,
    Testing,
}

impl fmt::Display for RegistrationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Testing => "testing",
        })
    }
}

/// Acquisition metadata lookup, keyed by an identifier (usually a path).
pub trait MetadataReader: Send + Sync {
    fn read(&self, source: &str) -> anyhow::Result<SidecarMetadata>;
}

/// Volume loading.
pub trait ImageReader<B: Backend>: Send + Sync {
    fn read(&self, path: &Path) -> anyhow::Result<Image<B, 3>>;
}

/// Result of registering a moving image onto a fixed image.
#[derive(Debug, Clone)]
pub struct RegistrationOutput<B: Backend> {
    /// Maps fixed-space points to moving-space points.
    pub transform: CompositeTransform<B>,
    pub warped: Image<B, 3>,
    pub report: Report,
}

pub trait Registration<B: Backend>: Send + Sync {
    fn register(
        &self,
        moving: &Image<B, 3>,
        fixed: &Image<B, 3>,
        preset: RegistrationPreset,
    ) -> anyhow::Result<RegistrationOutput<B>>;
}

/// Resampled image plus its report.
#[derive(Debug, Clone)]
pub struct Resampled<B: Backend> {
    pub image: Image<B, 3>,
    pub report: Report,
}

/// Resample `input` onto the grid of `reference` through `transform`.
pub trait TransformApplier<B: Backend>: Send + Sync {
    fn apply(
        &self,
        transform: &CompositeTransform<B>,
        reference: &Image<B, 3>,
        input: &Image<B, 3>,
        interpolation: Interpolation,
    ) -> anyhow::Result<Resampled<B>>;
}

#[derive(Debug, Clone)]
pub struct MaskOutput<B: Backend> {
    pub mask: Image<B, 3>,
    pub report: Report,
}

/// Brain-mask estimation.
pub trait MaskEstimator<B: Backend>: Send + Sync {
    fn estimate(&self, image: &Image<B, 3>) -> anyhow::Result<MaskOutput<B>>;
}

/// Intensity non-uniformity correction.
pub trait BiasFieldCorrector<B: Backend>: Send + Sync {
    fn correct(&self, image: &Image<B, 3>) -> anyhow::Result<Image<B, 3>>;
}

/// Put the header (geometry) of one image onto the data of another.
pub trait HeaderRepair<B: Backend>: Send + Sync {
    fn repair(&self, header: &Image<B, 3>, data: &Image<B, 3>) -> anyhow::Result<Image<B, 3>>;

    fn repair_series(&self, header: &Image<B, 3>, data: &Series<B>) -> anyhow::Result<Series<B>>;
}

/// Voxel-shift estimation from a fieldmap in rad/s.
pub trait FieldmapUnwarp<B: Backend>: Send + Sync {
    fn estimate(
        &self,
        fieldmap: &Image<B, 3>,
        dwell_time: f64,
        pe: PhaseEncodingDirection,
        mask: Option<&Image<B, 3>>,
    ) -> anyhow::Result<VoxelShiftMap<B>>;
}

/// Displacement estimates from a blip-pair estimator.
///
/// `fields` holds one three-volume series per input volume (components
/// `x, y, z` in mm) and `jacobians` the matching Jacobian maps.
#[derive(Debug, Clone)]
pub struct BlipPairOutput<B: Backend> {
    pub fields: Vec<Series<B>>,
    pub jacobians: Vec<Image<B, 3>>,
}

pub trait BlipPairEstimator<B: Backend>: Send + Sync {
    fn estimate(&self, volumes: &Series<B>, table: &AcquisitionTable) -> anyhow::Result<BlipPairOutput<B>>;
}

/// Persist a report artifact under a tag, below `base_directory`.
pub trait ReportSink: Send + Sync {
    fn write(&self, base_directory: &Path, source: &str, artifact: &Report, tag: &str) -> anyhow::Result<()>;
}

/// The set of bound capability implementations.
///
/// [`Capabilities::default`] binds the reference implementations of header
/// repair, transform application and fieldmap unwarping; everything else
/// must be bound by the caller.
pub struct Capabilities<B: Backend> {
    pub metadata_reader: Option<Arc<dyn MetadataReader>>,
    pub image_reader: Option<Arc<dyn ImageReader<B>>>,
    pub registration: Option<Arc<dyn Registration<B>>>,
    pub transform_applier: Option<Arc<dyn TransformApplier<B>>>,
    pub mask_estimator: Option<Arc<dyn MaskEstimator<B>>>,
    pub bias_corrector: Option<Arc<dyn BiasFieldCorrector<B>>>,
    pub header_repair: Option<Arc<dyn HeaderRepair<B>>>,
    pub fieldmap_unwarp: Option<Arc<dyn FieldmapUnwarp<B>>>,
    pub blip_pair_estimator: Option<Arc<dyn BlipPairEstimator<B>>>,
    pub report_sink: Option<Arc<dyn ReportSink>>,
}

impl<B: Backend> Capabilities<B> {
    /// No capability bound.
    pub fn empty() -> Self {
        Self {
            metadata_reader: None,
            image_reader: None,
            registration: None,
            transform_applier: None,
            mask_estimator: None,
            bias_corrector: None,
            header_repair: None,
            fieldmap_unwarp: None,
            blip_pair_estimator: None,
            report_sink: None,
        }
    }

    pub fn with_metadata_reader(mut self, reader: impl MetadataReader + 'static) -> Self {
        self.metadata_reader = Some(Arc::new(reader));
        self
    }

    pub fn with_image_reader(mut self, reader: impl ImageReader<B> + 'static) -> Self {
        self.image_reader = Some(Arc::new(reader));
        self
    }

    pub fn with_registration(mut self, registration: impl Registration<B> + 'static) -> Self {
        self.registration = Some(Arc::new(registration));
        self
    }

    pub fn with_transform_applier(mut self, applier: impl TransformApplier<B> + 'static) -> Self {
        self.transform_applier = Some(Arc::new(applier));
        self
    }

    pub fn with_mask_estimator(mut self, estimator: impl MaskEstimator<B> + 'static) -> Self {
        self.mask_estimator = Some(Arc::new(estimator));
        self
    }

    pub fn with_bias_corrector(mut self, corrector: impl BiasFieldCorrector<B> + 'static) -> Self {
        self.bias_corrector = Some(Arc::new(corrector));
        self
    }

    pub fn with_header_repair(mut self, repair: impl HeaderRepair<B> + 'static) -> Self {
        self.header_repair = Some(Arc::new(repair));
        self
    }

    pub fn with_fieldmap_unwarp(mut self, estimator: impl FieldmapUnwarp<B> + 'static) -> Self {
        self.fieldmap_unwarp = Some(Arc::new(estimator));
        self
    }

    pub fn with_blip_pair_estimator(mut self, estimator: impl BlipPairEstimator<B> + 'static) -> Self {
        self.blip_pair_estimator = Some(Arc::new(estimator));
        self
    }

    pub fn with_report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.report_sink = Some(Arc::new(sink));
        self
    }
}

impl<B: Backend> Default for Capabilities<B> {
    fn default() -> Self {
        Self::empty()
            .with_header_repair(CopyHeader)
            .with_transform_applier(ResamplingApplier)
            .with_fieldmap_unwarp(FieldmapShiftEstimator)
    }
}

impl<B: Backend> Clone for Capabilities<B> {
    fn clone(&self) -> Self {
        Self {
            metadata_reader: self.metadata_reader.clone(),
            image_reader: self.image_reader.clone(),
            registration: self.registration.clone(),
            transform_applier: self.transform_applier.clone(),
            mask_estimator: self.mask_estimator.clone(),
            bias_corrector: self.bias_corrector.clone(),
            header_repair: self.header_repair.clone(),
            fieldmap_unwarp: self.fieldmap_unwarp.clone(),
            blip_pair_estimator: self.blip_pair_estimator.clone(),
            report_sink: self.report_sink.clone(),
        }
    }
}
