// Upload client for the telephone line host (yemot-style IVR API).
//
// One multipart POST per attempt: auth token, destination extension path,
// fixed conversion flags, and the WAV itself. The API signals failures
// inside 2xx bodies, so those are checked for the error marker too.

use crate::core::delivery::{ArtifactUploader, AudioArtifact, DeliveryError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const UPLOAD_URL: &str = "https://call2all.co.il/ym/api/UploadFile";

/// The API reports failures as `responseStatus: ERROR` inside a 2xx body.
const ERROR_MARKER: &str = "ERROR";

pub struct YemotClient {
    client: Client,
    token: String,
    path: String,
}

impl YemotClient {
    pub fn new(token: String, path: String) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DeliveryError::Upload(e.to_string()))?;
        Ok(Self {
            client,
            token,
            path,
        })
    }
}

#[async_trait]
impl ArtifactUploader for YemotClient {
    async fn upload(&self, artifact: &AudioArtifact) -> Result<String, DeliveryError> {
        let file = Part::bytes(artifact.wav.clone())
            .file_name(artifact.file_name.clone())
            .mime_str("audio/wav")
            .map_err(|e| DeliveryError::Upload(e.to_string()))?;
        let form = Form::new()
            .text("token", self.token.clone())
            .text("path", self.path.clone())
            .text("convertAudio", "1")
            .text("autoNumbering", "true")
            .part("file", file);

        let response = self
            .client
            .post(UPLOAD_URL)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Upload(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Upload(e.to_string()))?;
        debug!("Line host answered {}: {}", status, body);

        if !status.is_success() {
            return Err(DeliveryError::Upload(format!(
                "status {}: {}",
                status, body
            )));
        }
        if body.contains(ERROR_MARKER) {
            return Err(DeliveryError::Upload(format!("line API error: {}", body)));
        }
        Ok(body)
    }
}
