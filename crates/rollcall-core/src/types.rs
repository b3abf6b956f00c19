use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Face embedding vector, L2-normalised by the encoder that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Name of the encoder backend that produced this embedding
    /// (e.g. "arcface", "thumbprint").
    pub encoder: String,
}

impl Embedding {
    /// Build an embedding from raw values, L2-normalising them.
    ///
    /// A zero vector is kept as-is rather than divided by zero.
    pub fn normalized(raw: Vec<f32>, encoder: &str) -> Self {
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };
        Self {
            values,
            encoder: encoder.to_string(),
        }
    }

    /// Euclidean distance to another embedding. Lower = more similar.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity to another embedding, in [-1, 1].
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// What the face store holds for a registered identity.
///
/// The reference variant keeps the registration image verbatim and defers
/// encoding to verify time; the embedding variant precomputes at
/// registration.
#[derive(Debug, Clone)]
pub enum FaceTemplate {
    Reference(RgbImage),
    Embedding(Embedding),
}

impl FaceTemplate {
    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FaceTemplate::Reference(_) => "reference",
            FaceTemplate::Embedding(_) => "embedding",
        }
    }
}

/// Per-candidate verification outcome.
#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome {
    pub verified: bool,
    /// Euclidean distance between probe and candidate embeddings.
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding {
            values,
            encoder: "test".into(),
        }
    }

    #[test]
    fn test_normalized_has_unit_length() {
        let e = Embedding::normalized(vec![3.0, 4.0], "test");
        let norm: f32 = e.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert_eq!(e.encoder, "test");
    }

    #[test]
    fn test_normalized_zero_vector_unchanged() {
        let e = Embedding::normalized(vec![0.0, 0.0, 0.0], "test");
        assert!(e.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = emb(vec![0.6, 0.8]);
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_orthogonal_unit_vectors() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!((a.distance(&b) - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_identical() {
        let a = emb(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_template_kind_labels() {
        let r = FaceTemplate::Reference(RgbImage::new(2, 2));
        let e = FaceTemplate::Embedding(emb(vec![1.0]));
        assert_eq!(r.kind(), "reference");
        assert_eq!(e.kind(), "embedding");
    }
}
