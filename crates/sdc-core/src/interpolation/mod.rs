//! Interpolation types and operations.
//!
//! This module provides interpolation traits and implementations
//! for sampling volumes at continuous coordinates, plus the serializable
//! [`Interpolation`] mode that workflow nodes carry as a static parameter.

pub mod kernel;
pub mod linear;
pub mod nearest;
pub mod trait_;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use kernel::{BSplineInterpolator, CubicBSpline, Kernel, KernelInterpolator, Lanczos, LanczosInterpolator};
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
pub use trait_::Interpolator;

/// Interpolation mode used when resampling an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpolation {
    NearestNeighbor,
    Linear,
    /// Cubic B-spline evaluated on prefiltered coefficients, so grid samples
    /// are reproduced exactly.
    BSpline,
    LanczosWindowedSinc,
}

impl<B: Backend> Interpolator<B> for Interpolation {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        match self {
            Self::NearestNeighbor => NearestNeighborInterpolator::new().interpolate(data, indices),
            Self::Linear => LinearInterpolator::new().interpolate(data, indices),
            Self::BSpline => BSplineInterpolator::default().interpolate(data, indices),
            Self::LanczosWindowedSinc => LanczosInterpolator::default().interpolate(data, indices),
        }
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NearestNeighbor => "NearestNeighbor",
            Self::Linear => "Linear",
            Self::BSpline => "BSpline",
            Self::LanczosWindowedSinc => "LanczosWindowedSinc",
        };
        f.write_str(name)
    }
}
