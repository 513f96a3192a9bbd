//! Receipt image forwarding to the external hosting provider.
//!
//! The contract is `upload(file) -> url | null`: a multipart POST carrying
//! the file bytes and a pre-shared upload preset. Any failure (host down,
//! non-JSON body, missing URL field) degrades to `None` so the transaction
//! proceeds without a receipt.

use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ReceiptConfig;

#[derive(Clone)]
pub struct ReceiptUploader {
    client: reqwest::Client,
    upload_url: Option<String>,
    upload_preset: String,
}

impl ReceiptUploader {
    pub fn new(config: &ReceiptConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            upload_url: config.upload_url.clone(),
            upload_preset: config.upload_preset.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.upload_url.is_some()
    }

    /// Uploads receipt bytes to the configured host, returning the hosted
    /// URL, or `None` when the host is not configured or the upload fails.
    pub async fn upload(&self, bytes: Vec<u8>, file_name: String) -> Option<String> {
        let upload_url = match &self.upload_url {
            Some(url) => url,
            None => {
                debug!("No receipt host configured, dropping receipt");
                return None;
            }
        };

        let part = Part::bytes(bytes).file_name(file_name);
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = match self.client.post(upload_url).multipart(form).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Receipt upload request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Receipt host returned an error");
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Receipt host returned a non-JSON body");
                return None;
            }
        };

        let url = extract_hosted_url(&body);
        if url.is_none() {
            warn!("Receipt host response contained no URL");
        }
        url
    }
}

fn extract_hosted_url(body: &serde_json::Value) -> Option<String> {
    body.get("secure_url")
        .or_else(|| body.get("url"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
