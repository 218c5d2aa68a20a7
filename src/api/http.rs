//! `reqwest` implementation of [`CardApi`].
//!
//! Thin HTTP wrapper. Status handling and body parsing live in the pure
//! functions [`parse_body`] and [`error_from_body`] for testability.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::CardApi;
use super::types::{
    ApiError, CardPage, CardRecord, ErrorBody, ImageGenerationRequest, ImageStatusReport, ImageSubmission,
    ImageUpload, SavedCard, UploadedImage,
};
use crate::card::CardId;
use crate::config::ApiConfig;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpCardApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCardApi {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `url(path)` with `segment` appended as one percent-encoded path segment.
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.url(path)).map_err(|e| ApiError::Request(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Request(format!("cannot append to {}", self.base_url)))?
            .push(segment);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        Ok((status, text))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let (status, text) = self.send(request).await?;
        if !is_success(status) {
            return Err(error_from_body(status, &text));
        }
        parse_body(&text)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let (status, text) = self.send(request).await?;
        if is_success(status) { Ok(()) } else { Err(error_from_body(status, &text)) }
    }
}

#[async_trait::async_trait]
impl CardApi for HttpCardApi {
    async fn list_cards(&self, page: u32, per_page: u32) -> Result<Vec<CardRecord>, ApiError> {
        debug!(page, per_page, "GET /cards");
        let request = self
            .http
            .get(self.url("/cards"))
            .query(&[("page", page), ("per_page", per_page)]);
        let body: CardPage = self.fetch(request).await?;
        Ok(body.cards)
    }

    async fn latest_card(&self) -> Result<Option<CardRecord>, ApiError> {
        match self.fetch(self.http.get(self.url("/cards/latest"))).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_card(&self, card: &CardRecord) -> Result<CardId, ApiError> {
        let saved: SavedCard = self.fetch(self.http.post(self.url("/cards")).json(card)).await?;
        Ok(saved.id)
    }

    async fn update_card(&self, id: CardId, card: &CardRecord) -> Result<(), ApiError> {
        self.execute(self.http.put(self.url(&format!("/cards/{id}"))).json(card)).await
    }

    async fn generate_card(&self) -> Result<CardRecord, ApiError> {
        self.fetch(self.http.post(self.url("/generate_card"))).await
    }

    async fn open_pack(&self) -> Result<Vec<CardRecord>, ApiError> {
        self.fetch(self.http.post(self.url("/open_pack"))).await
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("image", part);
        let uploaded: UploadedImage = self
            .fetch(self.http.post(self.url("/upload_image")).multipart(form))
            .await?;
        Ok(uploaded.filename)
    }

    async fn remove_image(&self, id: CardId) -> Result<(), ApiError> {
        self.execute(self.http.delete(self.url(&format!("/cards/{id}/remove_image"))))
            .await
    }

    async fn submit_image(&self, prompt: &str, card_id: CardId) -> Result<ImageSubmission, ApiError> {
        let body = ImageGenerationRequest { prompt, card_id };
        self.fetch(self.http.post(self.url("/image_gen/generate-image")).json(&body))
            .await
    }

    async fn image_status(&self, request_id: &str) -> Result<ImageStatusReport, ApiError> {
        let url = self.url_with_segment("/image_gen/request-status", request_id)?;
        self.fetch(self.http.get(url)).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

pub(crate) fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Build an error from a non-success response, preferring the server's own
/// `error` string.
pub(crate) fn error_from_body(status: u16, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(message) }) if !message.trim().is_empty() => message,
        _ => {
            warn!(status, "error response without an error message");
            format!("request failed with status {status}")
        }
    };
    ApiError::Response { status, message }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;
