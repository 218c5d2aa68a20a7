//! REST collaborator.
//!
//! DESIGN
//! ======
//! The engine talks to the card API only through the [`CardApi`] trait so
//! every component can be driven by an in-memory double in tests. The
//! production implementation is [`http::HttpCardApi`], a thin `reqwest`
//! wrapper with all response parsing in pure functions.

pub mod http;
pub mod types;

pub use http::HttpCardApi;
pub use types::{
    ApiError, CardRecord, ImageStatusReport, ImageSubmission, ImageUpload, ProbeStatus,
};

use crate::card::CardId;

/// Operations the engine needs from the card API.
#[async_trait::async_trait]
pub trait CardApi: Send + Sync {
    /// `GET /cards?page&per_page`.
    async fn list_cards(&self, page: u32, per_page: u32) -> Result<Vec<CardRecord>, ApiError>;

    /// `GET /cards/latest`. A 404 is `Ok(None)`.
    async fn latest_card(&self) -> Result<Option<CardRecord>, ApiError>;

    /// `POST /cards`, returning the id the server assigned.
    async fn create_card(&self, card: &CardRecord) -> Result<CardId, ApiError>;

    /// `PUT /cards/{id}`.
    async fn update_card(&self, id: CardId, card: &CardRecord) -> Result<(), ApiError>;

    /// `POST /generate_card`.
    async fn generate_card(&self) -> Result<CardRecord, ApiError>;

    /// `POST /open_pack`.
    async fn open_pack(&self) -> Result<Vec<CardRecord>, ApiError>;

    /// `POST /upload_image`, returning the stored filename.
    async fn upload_image(&self, upload: ImageUpload) -> Result<String, ApiError>;

    /// `DELETE /cards/{id}/remove_image`.
    async fn remove_image(&self, id: CardId) -> Result<(), ApiError>;

    /// `POST /image_gen/generate-image`.
    async fn submit_image(&self, prompt: &str, card_id: CardId) -> Result<ImageSubmission, ApiError>;

    /// `GET /image_gen/request-status/{request_id}`.
    async fn image_status(&self, request_id: &str) -> Result<ImageStatusReport, ApiError>;
}
