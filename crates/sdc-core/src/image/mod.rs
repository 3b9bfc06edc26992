//! Image types and operations.
//!
//! This module provides the Image type, its grid geometry and the
//! 4D series used to stack volumes of different acquisitions.

pub mod geometry;
pub mod image;
pub mod series;

pub use geometry::Geometry;
pub use image::Image;
pub use series::Series;
