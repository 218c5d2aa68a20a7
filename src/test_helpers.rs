//! In-memory [`CardApi`] double shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::api::types::{ApiError, CardRecord, ImageStatusReport, ImageSubmission, ImageUpload, ProbeStatus};
use crate::api::CardApi;
use crate::card::CardId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `n` minimal records with ids starting at `first_id`.
#[must_use]
pub fn records(n: usize, first_id: CardId) -> Vec<CardRecord> {
    (0..n)
        .map(|i| {
            let id = first_id + CardId::try_from(i).unwrap_or_default();
            CardRecord { id: Some(id), name: format!("Card {id}"), rarity: "Common".into(), ..CardRecord::default() }
        })
        .collect()
}

#[must_use]
pub fn report(status: ProbeStatus, urls: Option<Vec<&str>>, error: Option<&str>) -> ImageStatusReport {
    ImageStatusReport {
        status,
        image_urls: urls.map(|u| u.into_iter().map(str::to_owned).collect()),
        error: error.map(str::to_owned),
    }
}

#[must_use]
pub fn server_error(status: u16, message: &str) -> ApiError {
    ApiError::Response { status, message: message.to_owned() }
}

/// Scripted API. Each endpoint pops its queue; an empty queue answers with a
/// benign default (empty page, `PENDING`, id 1, ...).
#[derive(Default)]
pub struct MockApi {
    pages: Mutex<VecDeque<Result<Vec<CardRecord>, ApiError>>>,
    latest: Mutex<VecDeque<Result<Option<CardRecord>, ApiError>>>,
    creates: Mutex<VecDeque<Result<CardId, ApiError>>>,
    generated: Mutex<VecDeque<Result<CardRecord, ApiError>>>,
    packs: Mutex<VecDeque<Result<Vec<CardRecord>, ApiError>>>,
    submissions: Mutex<VecDeque<Result<ImageSubmission, ApiError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<ImageStatusReport, ApiError>>>>,
    status_gate: Mutex<Option<Arc<Notify>>>,

    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,

    pub requested_pages: Mutex<Vec<u32>>,
    pub probed: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(CardId, CardRecord)>>,
    pub submitted_prompts: Mutex<Vec<(String, CardId)>>,
}

impl MockApi {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, page: Result<Vec<CardRecord>, ApiError>) {
        lock(&self.pages).push_back(page);
    }

    pub fn push_latest(&self, latest: Result<Option<CardRecord>, ApiError>) {
        lock(&self.latest).push_back(latest);
    }

    pub fn push_create(&self, created: Result<CardId, ApiError>) {
        lock(&self.creates).push_back(created);
    }

    pub fn push_generated(&self, card: Result<CardRecord, ApiError>) {
        lock(&self.generated).push_back(card);
    }

    pub fn push_pack(&self, pack: Result<Vec<CardRecord>, ApiError>) {
        lock(&self.packs).push_back(pack);
    }

    pub fn push_submission(&self, submission: Result<ImageSubmission, ApiError>) {
        lock(&self.submissions).push_back(submission);
    }

    pub fn push_status(&self, request_id: &str, status: Result<ImageStatusReport, ApiError>) {
        lock(&self.statuses).entry(request_id.to_owned()).or_default().push_back(status);
    }

    /// Hold every status probe until `gate` is notified.
    pub fn gate_status(&self, gate: Arc<Notify>) {
        *lock(&self.status_gate) = Some(gate);
    }

    pub fn clear_status_gate(&self) {
        *lock(&self.status_gate) = None;
    }

    #[must_use]
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn probed_ids(&self) -> Vec<String> {
        lock(&self.probed).clone()
    }
}

#[async_trait::async_trait]
impl CardApi for MockApi {
    async fn list_cards(&self, page: u32, _per_page: u32) -> Result<Vec<CardRecord>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requested_pages).push(page);
        // Suspend like a real request so concurrent callers interleave.
        tokio::task::yield_now().await;
        lock(&self.pages).pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn latest_card(&self) -> Result<Option<CardRecord>, ApiError> {
        lock(&self.latest).pop_front().unwrap_or(Ok(None))
    }

    async fn create_card(&self, _card: &CardRecord) -> Result<CardId, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.creates).pop_front().unwrap_or(Ok(1))
    }

    async fn update_card(&self, id: CardId, card: &CardRecord) -> Result<(), ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.updates).push((id, card.clone()));
        Ok(())
    }

    async fn generate_card(&self) -> Result<CardRecord, ApiError> {
        lock(&self.generated)
            .pop_front()
            .unwrap_or_else(|| Ok(records(1, 1000).remove(0)))
    }

    async fn open_pack(&self) -> Result<Vec<CardRecord>, ApiError> {
        lock(&self.packs).pop_front().unwrap_or_else(|| Ok(records(15, 2000)))
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<String, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("stored_{}", upload.file_name))
    }

    async fn remove_image(&self, _id: CardId) -> Result<(), ApiError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn submit_image(&self, prompt: &str, card_id: CardId) -> Result<ImageSubmission, ApiError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.submitted_prompts).push((prompt.to_owned(), card_id));
        lock(&self.submissions)
            .pop_front()
            .unwrap_or_else(|| Ok(ImageSubmission { request_id: format!("req-{n}"), image_urls: None }))
    }

    async fn image_status(&self, request_id: &str) -> Result<ImageStatusReport, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.probed).push(request_id.to_owned());
        let gate = lock(&self.status_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.statuses)
            .get_mut(request_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(report(ProbeStatus::Pending, None, None)))
    }
}
