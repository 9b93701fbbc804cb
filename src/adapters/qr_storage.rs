//! QR proof image storage.
//!
//! The REST adapter uploads to the hosted object bucket and hands back the
//! public URL. Any upload trouble degrades to an inline `data:` URL so the
//! submission can still go through; the inline adapter does only that and
//! backs offline/demo mode.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::ports::{QrStorage, StorageError};

const QR_BUCKET: &str = "qr-codes";

fn inline_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

pub struct RestQrStorage {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl RestQrStorage {
    pub fn new(base_url: Url, anon_key: String, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            anon_key,
        }
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self::new(
            config.backend_url.clone()?,
            config.backend_anon_key.clone()?,
            config.request_timeout(),
        ))
    }

    fn object_url(&self, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/{QR_BUCKET}/{file_name}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn public_url(&self, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{QR_BUCKET}/{file_name}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    async fn try_upload(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .post(self.object_url(file_name))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", &self.anon_key))
            .header("Content-Type", "image/png")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError(format!(
                "bucket answered {}",
                response.status()
            )));
        }
        Ok(self.public_url(file_name))
    }
}

#[async_trait]
impl QrStorage for RestQrStorage {
    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError> {
        match self.try_upload(bytes, file_name).await {
            Ok(url) => Ok(url),
            Err(err) => {
                tracing::warn!(error = %err, file_name, "bucket upload failed, inlining image");
                Ok(inline_data_url(bytes))
            }
        }
    }
}

/// Always inlines the image as a `data:` URL. No network, no bucket.
#[derive(Default)]
pub struct InlineQrStorage;

impl InlineQrStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QrStorage for InlineQrStorage {
    async fn upload(&self, bytes: &[u8], _file_name: &str) -> Result<String, StorageError> {
        Ok(inline_data_url(bytes))
    }
}
