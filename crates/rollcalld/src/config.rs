use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address for the HTTP API (default: 127.0.0.1:8080).
    pub listen: String,
    /// Encoder backend: "arcface" or "thumbprint".
    pub encoder: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// What registrations store: "embedding" or "reference".
    pub store_mode: String,
    /// Euclidean distance threshold for a positive match.
    pub tolerance: f32,
    /// Whether nameless registrations get an auto-assigned user_N name.
    pub auto_name: bool,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            listen: std::env::var("ROLLCALL_LISTEN")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            encoder: std::env::var("ROLLCALL_ENCODER").unwrap_or_else(|_| "arcface".to_string()),
            model_dir: std::env::var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            store_mode: std::env::var("ROLLCALL_STORE_MODE")
                .unwrap_or_else(|_| "embedding".to_string()),
            tolerance: env_f32(
                "ROLLCALL_TOLERANCE",
                rollcall_core::matcher::DEFAULT_TOLERANCE,
            ),
            auto_name: std::env::var("ROLLCALL_AUTO_NAME")
                .map(|v| !v.is_empty() && v != "0")
                .unwrap_or(false),
        }
    }

    /// Path to the UltraFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
