//! Verification policy over a [`FaceEncoder`].
//!
//! A [`FaceMatcher`] turns enrolment images into templates and probe images
//! into embeddings, then scores probe-against-template. [`FaceVerifier`] is
//! the standard implementation, parameterised by [`StoreMode`].

use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::{Embedding, FaceTemplate, MatchOutcome};
use image::RgbImage;
use std::str::FromStr;
use std::sync::Arc;

/// Default distance tolerance for Euclidean comparison of L2-normalised
/// embeddings.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// What an enrolment stores.
///
/// `Embedding` encodes at enrolment time and requires a detectable face on
/// both sides. `Reference` keeps the raw image and defers encoding to
/// verification, without enforcing detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Embedding,
    Reference,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMode::Embedding => "embedding",
            StoreMode::Reference => "reference",
        }
    }
}

impl FromStr for StoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" => Ok(StoreMode::Embedding),
            "reference" => Ok(StoreMode::Reference),
            other => Err(format!(
                "unknown store mode '{other}' (expected 'embedding' or 'reference')"
            )),
        }
    }
}

/// Turns images into templates and probes, and scores them.
pub trait FaceMatcher: Send + Sync {
    /// Build the stored template for an enrolment image.
    fn enroll(&self, image: &RgbImage) -> Result<FaceTemplate, MatchError>;

    /// Encode a probe image once, for comparison against many templates.
    fn prepare(&self, image: &RgbImage) -> Result<Embedding, MatchError>;

    /// Score a prepared probe against one stored template.
    fn verify(&self, probe: &Embedding, template: &FaceTemplate)
        -> Result<MatchOutcome, MatchError>;

    /// Name of the underlying encoder.
    fn name(&self) -> &str;

    /// Store mode this matcher enrolls under.
    fn mode(&self) -> StoreMode;
}

/// Distance-threshold verifier over any [`FaceEncoder`].
pub struct FaceVerifier {
    encoder: Arc<dyn FaceEncoder>,
    tolerance: f32,
    mode: StoreMode,
}

impl FaceVerifier {
    pub fn new(encoder: Arc<dyn FaceEncoder>, tolerance: f32, mode: StoreMode) -> Self {
        Self {
            encoder,
            tolerance,
            mode,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Detection enforcement follows the store mode: embedding mode demands
    /// a real face, reference mode tolerates frames without one.
    fn enforce_detection(&self) -> bool {
        self.mode == StoreMode::Embedding
    }
}

impl FaceMatcher for FaceVerifier {
    fn enroll(&self, image: &RgbImage) -> Result<FaceTemplate, MatchError> {
        match self.mode {
            StoreMode::Embedding => {
                let embedding = self.encoder.encode(image, true)?;
                Ok(FaceTemplate::Embedding(embedding))
            }
            StoreMode::Reference => Ok(FaceTemplate::Reference(image.clone())),
        }
    }

    fn prepare(&self, image: &RgbImage) -> Result<Embedding, MatchError> {
        Ok(self.encoder.encode(image, self.enforce_detection())?)
    }

    fn verify(
        &self,
        probe: &Embedding,
        template: &FaceTemplate,
    ) -> Result<MatchOutcome, MatchError> {
        let distance = match template {
            FaceTemplate::Embedding(stored) => {
                if stored.encoder != probe.encoder {
                    tracing::warn!(
                        stored = %stored.encoder,
                        probe = %probe.encoder,
                        "comparing embeddings from different encoders"
                    );
                }
                probe.distance(stored)
            }
            FaceTemplate::Reference(image) => {
                let stored = self.encoder.encode(image, self.enforce_detection())?;
                probe.distance(&stored)
            }
        };

        Ok(MatchOutcome {
            verified: distance <= self.tolerance,
            distance,
        })
    }

    fn name(&self) -> &str {
        self.encoder.name()
    }

    fn mode(&self) -> StoreMode {
        self.mode
    }
}
