//! ONNX face encoder — UltraFace detection plus ArcFace embeddings.
//!
//! The detector is the UltraFace RFB-320 layout (two output tensors,
//! normalised corner boxes); the embedder is the w600k_r50 ArcFace model
//! producing 512-dimensional vectors. Both run on CPU via ONNX Runtime.

use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::Embedding;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

// Detector constants (UltraFace RFB-320 layout)
const DETECTOR_INPUT_WIDTH: u32 = 320;
const DETECTOR_INPUT_HEIGHT: u32 = 240;
const DETECTOR_MEAN: f32 = 127.0;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_SCORE_THRESHOLD: f32 = 0.7;
const DETECTOR_NMS_IOU: f32 = 0.3;

// Embedder constants (symmetric normalisation, unlike the detector)
const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5;
const ARCFACE_EMBEDDING_DIM: usize = 512;

/// Margin applied around a detected box before the square crop.
const CROP_EXPAND: f32 = 1.2;

const ENCODER_NAME: &str = "arcface";

/// A detected face in original-frame pixel coordinates (corner form).
#[derive(Debug, Clone, Copy)]
struct FaceBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// ONNX-backed face encoder.
///
/// Sessions sit behind mutexes so one encoder instance can be shared
/// across request handlers.
pub struct ArcFaceEncoder {
    detector: Mutex<Session>,
    embedder: Mutex<Session>,
    /// (scores, boxes) output indices, discovered by name at load time.
    detector_outputs: (usize, usize),
}

impl ArcFaceEncoder {
    /// Load both ONNX models. Fails fast if either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(detector_path).exists() {
            return Err(EncoderError::ModelNotFound(detector_path.to_string()));
        }
        if !Path::new(embedder_path).exists() {
            return Err(EncoderError::ModelNotFound(embedder_path.to_string()));
        }

        let detector = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(detector_path)?;

        let output_names: Vec<String> = detector
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        tracing::info!(
            path = detector_path,
            outputs = ?output_names,
            "loaded face detector model"
        );
        let detector_outputs = discover_detector_outputs(&output_names)?;

        let embedder = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(embedder_path)?;
        tracing::info!(
            path = embedder_path,
            outputs = ?embedder.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face embedder model"
        );

        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            detector_outputs,
        })
    }

    /// Detect faces, returning boxes sorted by score (best first).
    fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, EncoderError> {
        let input = preprocess_detector(image);
        let (scores_idx, boxes_idx) = self.detector_outputs;

        let mut session = self
            .detector
            .lock()
            .map_err(|_| EncoderError::InferenceFailed("detector session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("detector scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("detector boxes: {e}")))?;

        let detections = decode_detections(
            scores,
            boxes,
            image.width(),
            image.height(),
            DETECTOR_SCORE_THRESHOLD,
        );
        // nms returns survivors ordered by score, best first.
        Ok(nms(detections, DETECTOR_NMS_IOU))
    }

    /// Run the embedder on a 112×112 face crop.
    fn embed(&self, face: &RgbImage) -> Result<Embedding, EncoderError> {
        let input = preprocess_embedder(face);

        let mut session = self
            .embedder
            .lock()
            .map_err(|_| EncoderError::InferenceFailed("embedder session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::normalized(raw.to_vec(), ENCODER_NAME))
    }
}

impl FaceEncoder for ArcFaceEncoder {
    fn encode(&self, image: &RgbImage, enforce_detection: bool) -> Result<Embedding, EncoderError> {
        let faces = self.detect(image)?;

        let crop = match faces.first() {
            Some(face) => {
                tracing::debug!(
                    score = face.score,
                    faces = faces.len(),
                    "face detected, cropping dominant box"
                );
                crop_face(image, face)
            }
            None if enforce_detection => return Err(EncoderError::NoFaceDetected),
            None => {
                // Detection-enforcement disabled: embed the whole frame.
                tracing::debug!("no face detected, embedding whole frame");
                imageops::resize(
                    image,
                    ARCFACE_INPUT_SIZE,
                    ARCFACE_INPUT_SIZE,
                    FilterType::Triangle,
                )
            }
        };

        self.embed(&crop)
    }

    fn name(&self) -> &str {
        ENCODER_NAME
    }
}

/// Find the (scores, boxes) output indices by name, falling back to the
/// standard positional layout [0] = scores, [1] = boxes.
fn discover_detector_outputs(names: &[String]) -> Result<(usize, usize), EncoderError> {
    if names.len() < 2 {
        return Err(EncoderError::InferenceFailed(format!(
            "detector model requires 2 outputs (scores, boxes), got {}",
            names.len()
        )));
    }
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");
    match (scores, boxes) {
        (Some(s), Some(b)) => Ok((s, b)),
        _ => {
            tracing::info!(
                ?names,
                "detector output names not recognised, using positional mapping [0]=scores, [1]=boxes"
            );
            Ok((0, 1))
        }
    }
}

/// Resize to the detector input and normalise into a NCHW tensor.
fn preprocess_detector(image: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(
        image,
        DETECTOR_INPUT_WIDTH,
        DETECTOR_INPUT_HEIGHT,
        FilterType::Triangle,
    );
    let (w, h) = (DETECTOR_INPUT_WIDTH as usize, DETECTOR_INPUT_HEIGHT as usize);
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
    for y in 0..h {
        for x in 0..w {
            let px = resized.get_pixel(x as u32, y as u32).0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
            }
        }
    }
    tensor
}

/// Normalise a 112×112 RGB face crop into a NCHW tensor.
fn preprocess_embedder(face: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let px = if x < face.width() as usize && y < face.height() as usize {
                face.get_pixel(x as u32, y as u32).0
            } else {
                [0, 0, 0]
            };
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }
    }
    tensor
}

/// Decode UltraFace outputs: scores are (background, face) pairs, boxes are
/// corner coordinates normalised to [0, 1].
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<FaceBox> {
    let count = (scores.len() / 2).min(boxes.len() / 4);
    let (fw, fh) = (frame_width as f32, frame_height as f32);

    let mut detections = Vec::new();
    for i in 0..count {
        let score = scores[i * 2 + 1];
        if score <= threshold {
            continue;
        }
        detections.push(FaceBox {
            x1: boxes[i * 4] * fw,
            y1: boxes[i * 4 + 1] * fh,
            x2: boxes[i * 4 + 2] * fw,
            y2: boxes[i * 4 + 3] * fh,
            score,
        });
    }
    detections
}

/// Non-maximum suppression over corner-form boxes.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Square crop rectangle around a box, expanded by [`CROP_EXPAND`] and
/// clamped to the frame. Returns (x, y, width, height).
fn expand_box(face: &FaceBox, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
    let cx = (face.x1 + face.x2) / 2.0;
    let cy = (face.y1 + face.y2) / 2.0;
    let side = (face.x2 - face.x1).max(face.y2 - face.y1).max(1.0) * CROP_EXPAND;

    // Clamped so a box reported past the frame edge still yields a valid
    // crop rectangle instead of underflowing.
    let x1 = ((cx - side / 2.0).max(0.0) as u32).min(frame_width.saturating_sub(1));
    let y1 = ((cy - side / 2.0).max(0.0) as u32).min(frame_height.saturating_sub(1));
    let x2 = ((cx + side / 2.0) as u32).min(frame_width);
    let y2 = ((cy + side / 2.0) as u32).min(frame_height);

    (x1, y1, x2.saturating_sub(x1).max(1), y2.saturating_sub(y1).max(1))
}

fn crop_face(image: &RgbImage, face: &FaceBox) -> RgbImage {
    let (x, y, w, h) = expand_box(face, image.width(), image.height());
    let crop = imageops::crop_imm(image, x, y, w, h).to_image();
    imageops::resize(
        &crop,
        ARCFACE_INPUT_SIZE,
        ARCFACE_INPUT_SIZE,
        FilterType::Triangle,
    )
}
