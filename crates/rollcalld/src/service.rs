//! Attendance operations over the face matcher and the in-memory state.

use crate::store::{AttendanceLog, AttendanceRecord, FaceStore};
use rollcall_core::{
    decode_image, CodecError, EncoderError, FaceMatcher, FaceTemplate, MatchError, StoreMode,
};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No name provided")]
    MissingName,
    #[error("No faces registered yet")]
    NoFacesRegistered,
    #[error("Face not recognized")]
    NotRecognized,
    #[error("No face detected in image")]
    NoFaceDetected,
    #[error("Invalid image data: {0}")]
    InvalidImage(#[from] CodecError),
    #[error("face processing failed: {0}")]
    Processing(String),
}

impl From<MatchError> for ServiceError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Encoder(EncoderError::NoFaceDetected) => ServiceError::NoFaceDetected,
            MatchError::Encoder(other) => ServiceError::Processing(other.to_string()),
        }
    }
}

/// Result of a registration.
#[derive(Debug)]
pub struct RegisterOutcome {
    pub name: String,
    /// True when the name existed and its template was overwritten.
    pub replaced: bool,
    pub enrolled_at: String,
}

/// Result of a successful attendance mark.
#[derive(Debug)]
pub struct MarkOutcome {
    pub name: String,
    pub time: String,
    pub distance: f32,
}

/// Daemon state summary for the health endpoint.
pub struct ServiceStatus {
    pub encoder: String,
    pub store_mode: StoreMode,
    pub registered: usize,
    pub attendance_records: usize,
}

/// The attendance service: a face gallery, an attendance log, and the
/// matcher that compares probes against the gallery.
///
/// Image decoding and inference run on blocking threads; the locks guard
/// short critical sections and are never held across an await.
pub struct AttendanceService {
    matcher: Arc<dyn FaceMatcher>,
    store: RwLock<FaceStore>,
    log: RwLock<AttendanceLog>,
    auto_name: bool,
}

impl AttendanceService {
    pub fn new(matcher: Arc<dyn FaceMatcher>, auto_name: bool) -> Self {
        Self {
            matcher,
            store: RwLock::new(FaceStore::new()),
            log: RwLock::new(AttendanceLog::new()),
            auto_name,
        }
    }

    /// Register a face under `name`, overwriting any existing registration
    /// of the same name. With auto-naming enabled a missing name gets the
    /// next free `user_N`.
    pub async fn register(
        &self,
        name: Option<String>,
        image_base64: String,
    ) -> Result<RegisterOutcome, ServiceError> {
        let explicit = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if explicit.is_none() && !self.auto_name {
            return Err(ServiceError::MissingName);
        }

        let matcher = Arc::clone(&self.matcher);
        let template = task::spawn_blocking(move || -> Result<FaceTemplate, ServiceError> {
            let image = decode_image(&image_base64)?;
            Ok(matcher.enroll(&image)?)
        })
        .await
        .map_err(|e| ServiceError::Processing(format!("enroll task: {e}")))??;

        let enrolled_at = timestamp_now();
        let mut store = self
            .store
            .write()
            .map_err(|_| ServiceError::Processing("face store lock poisoned".into()))?;
        let name = match explicit {
            Some(n) => n,
            None => store.next_auto_name(),
        };
        let replaced = store.insert(name.clone(), template, enrolled_at.clone());
        drop(store);

        tracing::info!(name = %name, replaced, "face registered");
        Ok(RegisterOutcome {
            name,
            replaced,
            enrolled_at,
        })
    }

    /// Mark attendance: compare the probe against every registered face in
    /// enrolment order and log the first verified match.
    ///
    /// A candidate that fails to verify with an error is logged and skipped;
    /// only a scan that ends with no verified candidate is "not recognized".
    pub async fn mark(&self, image_base64: String) -> Result<MarkOutcome, ServiceError> {
        // Snapshot before any image work so an empty gallery answers
        // immediately, even for an undecodable payload.
        let candidates: Vec<(String, FaceTemplate)> = {
            let store = self
                .store
                .read()
                .map_err(|_| ServiceError::Processing("face store lock poisoned".into()))?;
            store
                .iter()
                .map(|r| (r.name.clone(), r.template.clone()))
                .collect()
        };
        if candidates.is_empty() {
            return Err(ServiceError::NoFacesRegistered);
        }

        let matcher = Arc::clone(&self.matcher);
        let matched = task::spawn_blocking(move || -> Result<Option<(String, f32)>, ServiceError> {
            let image = decode_image(&image_base64)?;
            let probe = matcher.prepare(&image)?;

            for (name, template) in &candidates {
                match matcher.verify(&probe, template) {
                    Ok(outcome) if outcome.verified => {
                        return Ok(Some((name.clone(), outcome.distance)));
                    }
                    Ok(outcome) => {
                        tracing::debug!(candidate = %name, distance = outcome.distance, "no match");
                    }
                    Err(err) => {
                        tracing::warn!(candidate = %name, error = %err, "verification error, skipping candidate");
                    }
                }
            }
            Ok(None)
        })
        .await
        .map_err(|e| ServiceError::Processing(format!("verify task: {e}")))??;

        match matched {
            Some((name, distance)) => {
                let time = timestamp_now();
                self.log
                    .write()
                    .map_err(|_| ServiceError::Processing("attendance log lock poisoned".into()))?
                    .append(name.clone(), time.clone());
                tracing::info!(name = %name, distance, "attendance marked");
                Ok(MarkOutcome {
                    name,
                    time,
                    distance,
                })
            }
            None => Err(ServiceError::NotRecognized),
        }
    }

    /// Every attendance record, oldest first.
    pub fn attendance(&self) -> Result<Vec<AttendanceRecord>, ServiceError> {
        Ok(self
            .log
            .read()
            .map_err(|_| ServiceError::Processing("attendance log lock poisoned".into()))?
            .snapshot())
    }

    pub fn status(&self) -> Result<ServiceStatus, ServiceError> {
        let registered = self
            .store
            .read()
            .map_err(|_| ServiceError::Processing("face store lock poisoned".into()))?
            .len();
        let attendance_records = self
            .log
            .read()
            .map_err(|_| ServiceError::Processing("attendance log lock poisoned".into()))?
            .len();
        Ok(ServiceStatus {
            encoder: self.matcher.name().to_string(),
            store_mode: self.matcher.mode(),
            registered,
            attendance_records,
        })
    }
}

/// Local wall-clock time, second precision, ISO 8601 without offset.
fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
