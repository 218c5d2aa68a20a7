//! Paged card list with single-flight loading and debounced infinite scroll.
//!
//! DESIGN
//! ======
//! The page cursor is the only explicit mutual-exclusion primitive in the
//! engine. `load_page` takes it with an atomic test-and-set; a second call
//! while one is outstanding is dropped, not queued. The flag is released by
//! an RAII guard so every exit path (success, empty page, error, dropped
//! future) clears it.
//!
//! `page` advances by exactly one per non-empty successful fetch. Empty and
//! failed fetches leave it alone.
//!
//! Scroll events go through a trailing debounce: only the last event inside
//! the window survives, and it loads only when the viewport is near the end
//! of the document and nothing is in flight.

#[cfg(test)]
#[path = "pagination_test.rs"]
mod pagination_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::{CardApi, CardRecord};
use crate::config::PaginationConfig;
use crate::error::EngineError;

/// List-rendering collaborator. Receives read-only records.
pub trait CardListSink: Send + Sync {
    /// Replace every visible card.
    fn replace(&self, cards: Vec<CardRecord>);

    /// Add cards after the visible ones.
    fn append(&self, cards: Vec<CardRecord>);

    /// Add cards before the visible ones.
    fn prepend(&self, cards: Vec<CardRecord>);

    /// Loading indicator.
    fn set_loading(&self, _loading: bool) {}
}

/// Viewport geometry sampled at a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub viewport_height: f64,
    pub scroll_y: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    /// Distance in pixels still below the viewport.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.document_height - (self.viewport_height + self.scroll_y)
    }

    #[must_use]
    pub fn near_bottom(&self, threshold_px: f64) -> bool {
        self.remaining() <= threshold_px
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Dropped: another load was in flight, or the scroll gate was closed.
    Skipped,
    Loaded { count: usize, next_page: u32 },
    /// The server returned an empty page.
    EndOfData,
}

// =============================================================================
// PAGE CURSOR
// =============================================================================

#[derive(Debug)]
pub struct PageCursor {
    page: AtomicU32,
    page_size: u32,
    in_flight: AtomicBool,
}

impl PageCursor {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self { page: AtomicU32::new(1), page_size: page_size.max(1), in_flight: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_acquire<'a>(&'a self, sink: &'a dyn CardListSink) -> Option<InFlightGuard<'a>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return None;
        }
        sink.set_loading(true);
        Some(InFlightGuard { cursor: self, sink })
    }

    fn advance(&self) -> u32 {
        self.page.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Clears the in-flight flag on drop.
struct InFlightGuard<'a> {
    cursor: &'a PageCursor,
    sink: &'a dyn CardListSink,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.cursor.in_flight.store(false, Ordering::Release);
        self.sink.set_loading(false);
    }
}

// =============================================================================
// DEBOUNCE
// =============================================================================

/// Trailing-edge debounce. Each call takes a ticket; after `wait` only the
/// holder of the newest ticket proceeds.
#[derive(Debug)]
pub struct Debouncer {
    wait: Duration,
    epoch: AtomicU64,
}

impl Debouncer {
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self { wait, epoch: AtomicU64::new(0) }
    }

    /// Resolves after the window; `true` if no later call arrived meanwhile.
    pub async fn settle(&self) -> bool {
        let ticket = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tokio::time::sleep(self.wait).await;
        self.epoch.load(Ordering::Acquire) == ticket
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct PaginationController {
    api: Arc<dyn CardApi>,
    sink: Arc<dyn CardListSink>,
    cursor: PageCursor,
    debouncer: Debouncer,
    scroll_threshold_px: f64,
}

impl PaginationController {
    #[must_use]
    pub fn new(api: Arc<dyn CardApi>, sink: Arc<dyn CardListSink>, config: &PaginationConfig) -> Self {
        Self {
            api,
            sink,
            cursor: PageCursor::new(config.page_size),
            debouncer: Debouncer::new(config.scroll_debounce),
            scroll_threshold_px: config.scroll_threshold_px,
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.cursor.page()
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.cursor.page_size()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cursor.is_in_flight()
    }

    /// Fetch the current page. `append = false` replaces the visible list.
    ///
    /// # Errors
    ///
    /// Returns the API error; the page cursor is unchanged.
    pub async fn load_page(&self, append: bool) -> Result<LoadOutcome, EngineError> {
        let Some(_guard) = self.cursor.try_acquire(self.sink.as_ref()) else {
            debug!("load already in flight; dropping request");
            return Ok(LoadOutcome::Skipped);
        };

        let page = self.cursor.page();
        let cards = match self.api.list_cards(page, self.cursor.page_size()).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!(page, error = %e, "card page fetch failed");
                return Err(e.into());
            }
        };

        if cards.is_empty() {
            info!(page, "no more cards");
            return Ok(LoadOutcome::EndOfData);
        }

        let count = cards.len();
        let next_page = self.cursor.advance();
        if append {
            self.sink.append(cards);
        } else {
            self.sink.replace(cards);
        }
        info!(page, count, append, "card page loaded");
        Ok(LoadOutcome::Loaded { count, next_page })
    }

    /// Feed one scroll event. Only the last event in each debounce window
    /// can trigger an appending load.
    ///
    /// # Errors
    ///
    /// Returns the API error from the triggered load.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<LoadOutcome, EngineError> {
        if !self.debouncer.settle().await {
            return Ok(LoadOutcome::Skipped);
        }
        if !metrics.near_bottom(self.scroll_threshold_px) || self.cursor.is_in_flight() {
            return Ok(LoadOutcome::Skipped);
        }
        self.load_page(true).await
    }

    /// Ask the server for a fresh card and show it first.
    ///
    /// # Errors
    ///
    /// Returns the API error; the list is untouched.
    pub async fn generate_card(&self) -> Result<CardRecord, EngineError> {
        self.sink.set_loading(true);
        let result = self.api.generate_card().await;
        self.sink.set_loading(false);
        let card = result.inspect_err(|e| warn!(error = %e, "card generation failed"))?;
        info!(id = ?card.id, "generated card");
        self.sink.prepend(vec![card.clone()]);
        Ok(card)
    }

    /// Clear the list and show a freshly opened pack.
    ///
    /// # Errors
    ///
    /// Returns the API error; the list stays cleared.
    pub async fn open_pack(&self) -> Result<usize, EngineError> {
        self.sink.set_loading(true);
        self.sink.replace(Vec::new());
        let result = self.api.open_pack().await;
        self.sink.set_loading(false);
        let pack = result.inspect_err(|e| warn!(error = %e, "pack opening failed"))?;
        let count = pack.len();
        info!(count, "opened pack");
        self.sink.append(pack);
        Ok(count)
    }
}
