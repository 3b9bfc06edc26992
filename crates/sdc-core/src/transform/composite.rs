//! Composite transform.
//!
//! Registration produces an ordered list of affine and dense-field parts. The
//! composite maps output-space points to input-space points by applying the
//! parts in list order: `T(x) = Tn(...T2(T1(x)))`.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::affine::AffineTransform;
use super::trait_::Transform;
use crate::error::Result;
use crate::field::DisplacementField;

/// One part of a [`CompositeTransform`].
#[derive(Debug, Clone)]
pub enum SpatialTransform<B: Backend> {
    Affine(AffineTransform),
    Displacement(DisplacementField<B>),
}

impl<B: Backend> Transform<B> for SpatialTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        match self {
            Self::Affine(affine) => affine.transform_points(points),
            Self::Displacement(field) => field.transform_points(points),
        }
    }
}

impl<B: Backend> From<AffineTransform> for SpatialTransform<B> {
    fn from(affine: AffineTransform) -> Self {
        Self::Affine(affine)
    }
}

impl<B: Backend> From<DisplacementField<B>> for SpatialTransform<B> {
    fn from(field: DisplacementField<B>) -> Self {
        Self::Displacement(field)
    }
}

/// Ordered chain of spatial transforms. An empty chain is the identity.
#[derive(Debug, Clone)]
pub struct CompositeTransform<B: Backend> {
    parts: Vec<SpatialTransform<B>>,
}

impl<B: Backend> CompositeTransform<B> {
    pub fn new(parts: Vec<SpatialTransform<B>>) -> Self {
        Self { parts }
    }

    pub fn identity() -> Self {
        Self { parts: Vec::new() }
    }

    /// Append a part, applied after every existing one.
    pub fn then(mut self, part: impl Into<SpatialTransform<B>>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn parts(&self) -> &[SpatialTransform<B>] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<B: Backend> Default for CompositeTransform<B> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<B: Backend> Transform<B> for CompositeTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        self.parts
            .iter()
            .try_fold(points, |current, part| part.transform_points(current))
    }
}
