//! Image reference handling for the Darkroom proxy
//!
//! Normalizes client-supplied image references into forms the model API
//! accepts and keeps uploaded images in a bounded in-memory store so they
//! can be served from a local URL.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

pub mod data_url;
mod error;
pub mod reference;
mod store;

pub use data_url::DataUrl;
pub use error::{ReferenceError, Result};
pub use reference::{ImageNormalizer, ImageReference, ReferenceContext};
pub use store::{TempImage, TempImageStore};
