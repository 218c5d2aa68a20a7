//! The authoring session: one card under edit, its image workflow and the
//! AI prompt, wired to the card API.
//!
//! DESIGN
//! ======
//! The session exclusively owns the [`CardModel`]. The image workflow never
//! holds a reference into it; only a resolved result URL is copied into the
//! card by [`AuthoringSession::commit_generated_image`].
//!
//! An `id` exists only after a successful create. `save` routes to create or
//! update accordingly, and image generation on an unsaved card asks the user
//! before creating it.
//!
//! ERROR HANDLING
//! ==============
//! Validation and upload checks run before any network call. A declined
//! confirmation returns [`EngineError::UserAbort`] with nothing changed.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{CardApi, CardRecord, ImageUpload};
use crate::card::{CardDescriptor, CardField, CardId, CardModel, ValidationError};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::image_gen::{ImageWorkflow, SubmitOutcome};
use crate::render::{CardView, RenderProjection};

pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

pub const SAVE_BEFORE_IMAGE_PROMPT: &str =
    "The card has not been saved yet. Would you like to save it now to generate an AI image?";
pub const RESET_PROMPT: &str = "Are you sure you want to reset the form? This will clear all current data.";

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

pub struct AuthoringSession {
    api: Arc<dyn CardApi>,
    model: CardModel,
    workflow: ImageWorkflow,
    projection: RenderProjection,
    prompt: String,
}

impl AuthoringSession {
    #[must_use]
    pub fn new(api: Arc<dyn CardApi>, config: &EngineConfig) -> Self {
        Self {
            workflow: ImageWorkflow::new(Arc::clone(&api), config.poll),
            api,
            model: CardModel::new(),
            projection: RenderProjection::new(config.api.image_base_path.clone()),
            prompt: String::new(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &CardModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut CardModel {
        &mut self.model
    }

    #[must_use]
    pub fn card(&self) -> &CardDescriptor {
        self.model.card()
    }

    /// Current projection of the card under edit.
    #[must_use]
    pub fn view(&self) -> CardView {
        self.projection.project(self.model.card())
    }

    #[must_use]
    pub fn workflow(&self) -> &ImageWorkflow {
        &self.workflow
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        prompt.clone_into(&mut self.prompt);
    }

    /// The generate button is enabled only with a non-blank prompt.
    #[must_use]
    pub fn can_generate_image(&self) -> bool {
        !self.prompt.trim().is_empty()
    }

    pub fn toggle_dark_mode(&mut self) -> bool {
        self.model.toggle_dark_mode()
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Replace the card with the server's latest. Returns `false` when the
    /// server has none, leaving a new card in place.
    ///
    /// # Errors
    ///
    /// Returns the API error; the current card is kept.
    pub async fn load_latest(&mut self) -> Result<bool, EngineError> {
        let Some(record) = self.api.latest_card().await? else {
            info!("no existing card; starting a new one");
            return Ok(false);
        };
        self.workflow.cancel();
        info!(id = ?record.id, "loaded latest card");
        self.model.load(record.into());
        Ok(true)
    }

    /// Validate, then create or update.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any request, or the API error.
    pub async fn save(&mut self) -> Result<CardId, EngineError> {
        match self.model.card().id {
            Some(_) => self.update().await,
            None => self.create().await,
        }
    }

    /// `POST /cards` and adopt the echoed id.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`EngineError::InvalidState`] if the card
    /// already exists, or the API error.
    pub async fn create(&mut self) -> Result<CardId, EngineError> {
        if self.model.card().id.is_some() {
            return Err(EngineError::InvalidState("card already exists; update it instead"));
        }
        self.model.validate()?;
        let record = CardRecord::from(self.model.card());
        let id = self.api.create_card(&record).await?;
        self.model.assign_id(id);
        info!(id, "card created");
        Ok(id)
    }

    /// `PUT /cards/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidState`] for a card that was never
    /// created, a validation error, or the API error.
    pub async fn update(&mut self) -> Result<CardId, EngineError> {
        let Some(id) = self.model.card().id else {
            return Err(EngineError::InvalidState("Cannot update card. Card ID is missing."));
        };
        self.model.validate()?;
        self.persist(id).await?;
        Ok(id)
    }

    async fn persist(&self, id: CardId) -> Result<(), EngineError> {
        let record = CardRecord::from(self.model.card());
        self.api.update_card(id, &record).await?;
        info!(id, "card updated");
        Ok(())
    }

    // =========================================================================
    // IMAGES
    // =========================================================================

    /// Check and upload a local image, then point the card at it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Upload`] for a non-image or oversized file
    /// (nothing is sent), or the API error.
    pub async fn upload_image(&mut self, upload: ImageUpload) -> Result<String, EngineError> {
        if !upload.mime_type.starts_with("image/") {
            return Err(EngineError::Upload("Please upload a valid image file.".into()));
        }
        if upload.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(EngineError::Upload("Image size should be less than 2MB.".into()));
        }
        let size = upload.bytes.len();
        let filename = self.api.upload_image(upload).await?;
        info!(%filename, size, "image uploaded");
        self.model.set_image_ref(Some(filename.clone()));
        Ok(filename)
    }

    /// Detach the card's image. Unsaved or image-less cards clear locally.
    ///
    /// # Errors
    ///
    /// Returns the API error; the image reference is kept.
    pub async fn remove_image(&mut self) -> Result<(), EngineError> {
        if let (Some(id), Some(_)) = (self.model.card().id, self.model.card().image_ref.as_ref()) {
            self.api.remove_image(id).await?;
            info!(id, "image removed");
        }
        self.model.set_image_ref(None);
        Ok(())
    }

    /// Submit the stored prompt for this card, creating the card first if
    /// the user agrees.
    ///
    /// # Errors
    ///
    /// - validation error for a blank prompt or an incomplete card;
    /// - [`EngineError::UserAbort`] if the user declines to save;
    /// - the API error from create or submit.
    pub async fn generate_image(&mut self, confirm: &dyn Confirm) -> Result<SubmitOutcome, EngineError> {
        if !self.can_generate_image() {
            return Err(ValidationError { missing_fields: vec![CardField::Prompt] }.into());
        }
        let id = match self.model.card().id {
            Some(id) => id,
            None => {
                if !confirm.confirm(SAVE_BEFORE_IMAGE_PROMPT) {
                    info!("image generation cancelled; card not saved");
                    return Err(EngineError::UserAbort);
                }
                self.create().await.inspect_err(|e| warn!(error = %e, "card creation before image failed"))?
            }
        };
        let prompt = self.prompt.clone();
        self.workflow.submit(&prompt, id).await
    }

    /// Adopt the completed image as the card image and clear the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidState`] unless an image is ready, or the
    /// API error from persisting it (the card keeps the new image locally).
    pub async fn commit_generated_image(&mut self) -> Result<String, EngineError> {
        let url = self.workflow.take_result()?;
        self.model.set_image_ref(Some(url.clone()));
        self.prompt.clear();
        if let Some(id) = self.model.card().id {
            self.persist(id).await?;
        }
        Ok(url)
    }

    /// Back to a blank card after confirmation. Stops any live polling.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserAbort`] if the user declines.
    pub fn reset(&mut self, confirm: &dyn Confirm) -> Result<(), EngineError> {
        if !confirm.confirm(RESET_PROMPT) {
            return Err(EngineError::UserAbort);
        }
        self.workflow.cancel();
        self.model.reset();
        self.prompt.clear();
        info!("card reset");
        Ok(())
    }
}
