//! Seam to the external detection / alignment / embedding models.
//!
//! facelib never runs a detector or a network itself. Callers plug their model
//! stack in by implementing [`FacePipeline`].

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Embedding;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("alignment failed: {0}")]
    Alignment(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Bounding box of a detected face in frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// A normalized, cropped and warped face image ready for embedding.
#[derive(Debug, Clone)]
pub struct FaceChip(pub RgbImage);

/// Detection, alignment and embedding models.
///
/// Methods take `&mut self` because inference sessions usually need mutable
/// access to their scratch buffers.
pub trait FacePipeline {
    /// Locate every face in `image`.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError>;

    /// Produce the aligned chip for one detected face.
    fn align(&mut self, image: &RgbImage, face: &FaceRegion) -> Result<FaceChip, PipelineError>;

    /// Embed an aligned chip.
    fn embed(&mut self, chip: &FaceChip) -> Result<Embedding, PipelineError>;
}

impl<P: FacePipeline + ?Sized> FacePipeline for &mut P {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError> {
        (**self).detect(image)
    }

    fn align(&mut self, image: &RgbImage, face: &FaceRegion) -> Result<FaceChip, PipelineError> {
        (**self).align(image, face)
    }

    fn embed(&mut self, chip: &FaceChip) -> Result<Embedding, PipelineError> {
        (**self).embed(chip)
    }
}

impl<P: FacePipeline + ?Sized> FacePipeline for Box<P> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError> {
        (**self).detect(image)
    }

    fn align(&mut self, image: &RgbImage, face: &FaceRegion) -> Result<FaceChip, PipelineError> {
        (**self).align(image, face)
    }

    fn embed(&mut self, chip: &FaceChip) -> Result<Embedding, PipelineError> {
        (**self).embed(chip)
    }
}
