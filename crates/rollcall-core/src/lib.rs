//! rollcall-core — face matching building blocks for the attendance daemon.
//!
//! Holds the payload image codec, the pluggable [`FaceEncoder`] capability
//! (an ONNX ArcFace backend and a model-free thumbprint fallback) and the
//! [`FaceMatcher`] policy layer that turns an encoder into enroll and
//! verify decisions.

pub mod arcface;
pub mod codec;
pub mod encoder;
pub mod matcher;
pub mod types;

pub use arcface::ArcFaceEncoder;
pub use codec::{decode_image, CodecError};
pub use encoder::{EncoderError, FaceEncoder, ThumbprintEncoder};
pub use matcher::{FaceMatcher, FaceVerifier, MatchError, StoreMode};
pub use types::{Embedding, FaceTemplate, MatchOutcome};
