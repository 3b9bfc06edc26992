//! Image, field and numeric primitives for susceptibility distortion
//! correction of echo-planar images.

pub mod acquisition;
pub mod error;
pub mod field;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod jacobian;
pub mod metadata;
pub mod phase_encoding;
pub mod transform;
pub mod units;
pub mod vsm;

pub use acquisition::{AcquisitionParameterRow, AcquisitionTable};
pub use error::{Result, SdcError};
pub use field::{DisplacementField, VoxelShiftMap};
pub use image::{Geometry, Image, Series};
pub use interpolation::Interpolation;
pub use metadata::SidecarMetadata;
pub use phase_encoding::PhaseEncodingDirection;
pub use transform::{AffineTransform, CompositeTransform, SpatialTransform, Transform};
