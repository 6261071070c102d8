//! HTTP adapters for the external collaborators
//!
//! Thin plumbing only: each adapter maps one external contract
//! (camera, vision model sidecar, evidence blob store, push gateway)
//! onto reqwest and translates transport failures into `Dependency`
//! errors. No pipeline logic lives here.

use crate::detect::{Detection, EvidenceStore, Frame, FrameClassifier, FrameSource};
use crate::notify::{Notification, PushError, PushGateway};
use sentra_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;

/// Camera snapshot endpoint: every GET returns the current frame
pub struct SnapshotFrameSource {
    client: reqwest::Client,
    url: String,
}

impl SnapshotFrameSource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl FrameSource for SnapshotFrameSource {
    fn next_frame(&self) -> impl Future<Output = Result<Frame>> + Send {
        async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| Error::Dependency(format!("Camera unreachable: {}", e)))?
                .error_for_status()
                .map_err(|e| Error::Dependency(format!("Camera error: {}", e)))?;

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Dependency(format!("Camera read failed: {}", e)))?;

            Ok(Frame::new(bytes.to_vec()))
        }
    }
}

/// Inference sidecar exposing the model's `detect(frame)` contract
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl FrameClassifier for HttpClassifier {
    fn detect(&self, frame: &Frame) -> impl Future<Output = Result<Vec<Detection>>> + Send {
        let request = self
            .client
            .post(format!("{}/detect", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(frame.bytes.clone());

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| Error::Dependency(format!("Classifier unreachable: {}", e)))?
                .error_for_status()
                .map_err(|e| Error::Dependency(format!("Classifier error: {}", e)))?;

            response
                .json::<Vec<Detection>>()
                .await
                .map_err(|e| Error::Dependency(format!("Bad classifier response: {}", e)))
        }
    }
}

/// Object-storage service holding evidence images
pub struct HttpEvidenceStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEvidenceStore {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl EvidenceStore for HttpEvidenceStore {
    fn put(&self, bytes: &[u8], path: &str) -> impl Future<Output = Result<String>> + Send {
        let request = self
            .client
            .post(format!("{}/object/{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(bytes.to_vec());
        let uri = self.public_url(path);

        async move {
            request
                .send()
                .await
                .map_err(|e| Error::Dependency(format!("Evidence store unreachable: {}", e)))?
                .error_for_status()
                .map_err(|e| Error::Dependency(format!("Evidence upload rejected: {}", e)))?;

            Ok(uri)
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}", self.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    message_id: String,
}

/// Push notification gateway (FCM-style)
pub struct HttpPushGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPushGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl PushGateway for HttpPushGateway {
    fn send(
        &self,
        token: &str,
        notification: &Notification,
    ) -> impl Future<Output = std::result::Result<String, PushError>> + Send {
        let mut body: HashMap<&str, serde_json::Value> = HashMap::new();
        body.insert("token", token.into());
        body.insert("title", notification.title.clone().into());
        body.insert("body", notification.body.clone().into());
        body.insert(
            "data",
            serde_json::to_value(&notification.data).unwrap_or_default(),
        );

        let request = self
            .client
            .post(format!("{}/send", self.base_url))
            .json(&body);

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| PushError::Network(e.to_string()))?;

            match response.status() {
                status if status.is_success() => response
                    .json::<PushResponse>()
                    .await
                    .map(|r| r.message_id)
                    .map_err(|e| PushError::Network(e.to_string())),
                reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::NOT_FOUND => {
                    Err(PushError::TokenInvalid)
                }
                status => Err(PushError::Network(format!("gateway returned {}", status))),
            }
        }
    }
}
