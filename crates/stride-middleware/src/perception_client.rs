//! Perception service boundary.
//!
//! A captured frame goes to the perception backend as raw JPEG bytes. The
//! endpoint depends on the [`SensingMode`]: `/detect` for hazard scanning,
//! `/ocr` for text reading. The backend answers with a
//! [`PerceptionResponse`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stride_hal::camera::CameraFrame;
use stride_perception::PerceptionResponse;
use stride_types::StrideError;
use tracing::debug;

use crate::routing::ClientError;

/// What the live sensing loop is asking the backend for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensingMode {
    #[default]
    Off,
    HazardScan,
    TextReading,
}

impl SensingMode {
    /// `true` for modes that sample the camera.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Backend path for this mode, `None` when nothing is sent.
    pub fn endpoint(self) -> Option<&'static str> {
        match self {
            Self::Off => None,
            Self::HazardScan => Some("/detect"),
            Self::TextReading => Some("/ocr"),
        }
    }
}

impl fmt::Display for SensingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::HazardScan => "hazard scan",
            Self::TextReading => "text reading",
        })
    }
}

/// Turns frames into perception responses.
#[async_trait]
pub trait PerceptionService: Send + Sync {
    /// Analyse one frame.
    ///
    /// # Errors
    ///
    /// [`StrideError::SensorTimeout`] when the backend does not answer in
    /// time, [`StrideError::PerceptionFailed`] for transport or status
    /// errors, [`StrideError::BadResponse`] for unusable bodies.
    async fn submit(
        &self,
        frame: &CameraFrame,
        mode: SensingMode,
    ) -> Result<PerceptionResponse, StrideError>;
}

fn to_stride(e: ClientError, timeout: Duration) -> StrideError {
    match e {
        e if e.is_timeout() => StrideError::SensorTimeout {
            sensor: "perception".to_string(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        },
        ClientError::Http(e) => StrideError::PerceptionFailed(e.to_string()),
        ClientError::BadResponse(msg) => StrideError::BadResponse(msg),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HttpPerceptionService {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpPerceptionService {
    /// # Errors
    ///
    /// [`ClientError::Http`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_frame(&self, frame: &CameraFrame, path: &str) -> Result<String, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, bytes = frame.data.len(), "submitting frame");
        let body = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(frame.data.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// Probe `/healthz`.
    ///
    /// # Errors
    ///
    /// [`StrideError::PerceptionFailed`] when the backend is unreachable or
    /// unhealthy.
    pub async fn health(&self) -> Result<(), StrideError> {
        let url = format!("{}/healthz", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| to_stride(ClientError::Http(e), self.timeout))
    }
}

#[async_trait]
impl PerceptionService for HttpPerceptionService {
    async fn submit(
        &self,
        frame: &CameraFrame,
        mode: SensingMode,
    ) -> Result<PerceptionResponse, StrideError> {
        let path = mode.endpoint().ok_or_else(|| {
            StrideError::PerceptionFailed("sensing is off; nothing to submit".into())
        })?;
        let body = self
            .post_frame(frame, path)
            .await
            .map_err(|e| to_stride(e, self.timeout))?;
        PerceptionResponse::from_json(&body)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted stub
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted perception answer.
#[derive(Debug, Clone)]
pub enum PerceptionReply {
    Respond(PerceptionResponse),
    /// Respond after the given delay.
    Delayed(Duration, PerceptionResponse),
    Fail(StrideError),
    /// Never answer.
    Hang,
}

/// A perception service that replays queued replies, then repeats a
/// default.
#[derive(Debug)]
pub struct ScriptedPerception {
    queue: Mutex<VecDeque<PerceptionReply>>,
    default: Mutex<PerceptionReply>,
    calls: AtomicUsize,
    modes: Mutex<Vec<SensingMode>>,
}

impl ScriptedPerception {
    pub fn new(default: PerceptionReply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with a response that speaks `text`.
    pub fn speaking(text: &str) -> Self {
        Self::new(PerceptionReply::Respond(PerceptionResponse {
            spoken_message: Some(text.to_string()),
            ..PerceptionResponse::default()
        }))
    }

    pub fn push(&self, reply: PerceptionReply) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    pub fn set_default(&self, reply: PerceptionReply) {
        *self.default.lock().unwrap_or_else(|e| e.into_inner()) = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<SensingMode> {
        self.modes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PerceptionService for ScriptedPerception {
    async fn submit(
        &self,
        _frame: &CameraFrame,
        mode: SensingMode,
    ) -> Result<PerceptionResponse, StrideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mode);
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let reply = match queued {
            Some(reply) => reply,
            None => self
                .default
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        };
        match reply {
            PerceptionReply::Respond(r) => Ok(r),
            PerceptionReply::Delayed(d, r) => {
                tokio::time::sleep(d).await;
                Ok(r)
            }
            PerceptionReply::Fail(e) => Err(e),
            PerceptionReply::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CameraFrame {
        CameraFrame {
            width: 1,
            height: 1,
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        }
    }

    #[test]
    fn mode_endpoints() {
        assert_eq!(SensingMode::Off.endpoint(), None);
        assert_eq!(SensingMode::HazardScan.endpoint(), Some("/detect"));
        assert_eq!(SensingMode::TextReading.endpoint(), Some("/ocr"));
        assert!(!SensingMode::Off.is_live());
        assert!(SensingMode::TextReading.is_live());
    }

    #[tokio::test]
    async fn http_submit_with_mode_off_is_rejected_without_network() {
        let svc = HttpPerceptionService::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(svc.base_url(), "http://127.0.0.1:9");
        let err = svc.submit(&frame(), SensingMode::Off).await.unwrap_err();
        assert!(matches!(err, StrideError::PerceptionFailed(_)));
    }

    #[tokio::test]
    async fn scripted_replays_queue_then_default() {
        let svc = ScriptedPerception::speaking("Chair ahead");
        svc.push(PerceptionReply::Fail(StrideError::PerceptionFailed("500".into())));

        assert!(svc.submit(&frame(), SensingMode::HazardScan).await.is_err());
        let r = svc.submit(&frame(), SensingMode::TextReading).await.unwrap();
        assert_eq!(r.spoken_message.as_deref(), Some("Chair ahead"));
        assert_eq!(svc.calls(), 2);
        assert_eq!(
            svc.modes(),
            vec![SensingMode::HazardScan, SensingMode::TextReading]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_hang_never_resolves() {
        let svc = ScriptedPerception::new(PerceptionReply::Hang);
        let result =
            tokio::time::timeout(Duration::from_secs(30), svc.submit(&frame(), SensingMode::HazardScan))
                .await;
        assert!(result.is_err());
    }
}
