//! Face encoding capability — the seam between the attendance glue and
//! whatever library actually understands faces.

use crate::types::Embedding;
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("model file not found: {0} — download the ONNX models and place them in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

// Builder methods return `ort::Error<SessionBuilder>` (carrying the builder
// for recovery); fold it into the plain `ort::Error` the variant holds.
impl From<ort::Error<ort::session::builder::SessionBuilder>> for EncoderError {
    fn from(err: ort::Error<ort::session::builder::SessionBuilder>) -> Self {
        EncoderError::Ort(err.into())
    }
}

/// Produces a face embedding from an RGB image.
///
/// `enforce_detection = true` means a frame without a detectable face is an
/// error (`NoFaceDetected`); with `false` the encoder falls back to
/// embedding the whole frame.
pub trait FaceEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage, enforce_detection: bool) -> Result<Embedding, EncoderError>;

    /// Backend label, recorded on every embedding it produces.
    fn name(&self) -> &str;
}

const THUMBPRINT_GRID: u32 = 16;

/// Model-free encoder: luma thumbnail, mean-centered and L2-normalised.
///
/// Carries no face detector — the whole frame is treated as the face
/// region and `enforce_detection` is a no-op. Deterministic, so the test
/// suites build on it; also selectable in config for model-less setups.
pub struct ThumbprintEncoder {
    grid: u32,
}

impl ThumbprintEncoder {
    pub fn new() -> Self {
        Self {
            grid: THUMBPRINT_GRID,
        }
    }
}

impl Default for ThumbprintEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceEncoder for ThumbprintEncoder {
    fn encode(&self, image: &RgbImage, _enforce_detection: bool) -> Result<Embedding, EncoderError> {
        let small = imageops::resize(image, self.grid, self.grid, FilterType::Triangle);
        let gray = imageops::grayscale(&small);

        let raw: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32).collect();
        let mean = raw.iter().sum::<f32>() / raw.len() as f32;
        let centered: Vec<f32> = raw.iter().map(|v| v - mean).collect();

        Ok(Embedding::normalized(centered, self.name()))
    }

    fn name(&self) -> &str {
        "thumbprint"
    }
}
