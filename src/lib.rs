//! # cardforge
//!
//! Authoring and preview engine for trading cards. Persistence, image
//! storage and AI image synthesis live behind a remote REST API; this crate
//! owns the interactive state that sits in front of it.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`mana`] | Mana-cost tokenizer, dominant color and glyph tables |
//! | [`card`] | The card under edit ([`card::CardModel`]) and its validation |
//! | [`render`] | Pure projection from a card to a view description |
//! | [`pagination`] | Single-flight page loader and debounced infinite scroll |
//! | [`image_gen`] | AI image workflow: submit, poll, supersede, commit |
//! | [`tilt`] | Pointer-driven 3D tilt geometry for rare cards |
//! | [`session`] | Authoring session tying the model, API and workflow together |
//! | [`api`] | REST collaborator trait, wire types and the `reqwest` client |
//! | [`config`] | Environment-driven engine configuration |
//! | [`error`] | Engine-wide error taxonomy |

pub mod api;
pub mod card;
pub mod config;
pub mod error;
pub mod image_gen;
pub mod mana;
pub mod pagination;
pub mod render;
pub mod session;
pub mod tilt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::EngineError;
