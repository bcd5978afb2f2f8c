//! Modular on-disk model store
//!
//! A model directory holds `metadata.json` (the manifest) and one
//! `class_<k>.bin` per speaker. Mutations write classifier files first and
//! the manifest last, under a directory-level advisory lock, so a crash
//! mid-write leaves the previous manifest consistent. A snapshot-swap
//! handle shares the live model with concurrent readers.

pub mod error;
pub mod handle;
pub mod store;

pub use error::ModelLoadError;
pub use handle::ModelHandle;
pub use store::{Manifest, ModelStore};
