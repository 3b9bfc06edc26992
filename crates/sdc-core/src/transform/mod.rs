//! Spatial transforms.
//!
//! Transforms map physical points between spaces. The resampling filter
//! consumes them in the output-to-input direction.

pub mod affine;
pub mod composite;
pub mod displacement;
pub mod trait_;

pub use affine::AffineTransform;
pub use composite::{CompositeTransform, SpatialTransform};
pub use trait_::Transform;
