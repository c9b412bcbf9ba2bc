//! Cache module for storing downloaded images on disk
//!
//! This module provides an image cache keyed by source URL, the weekly refresh
//! policy that flushes it, and a loader that fills it from the network. Cache
//! failures never reach callers: a broken cache behaves like an empty one.

mod images;
mod loader;
mod policy;

pub use images::{ImageCache, LAST_REFRESH_KEY};
pub use loader::{
    validate_image, ImageError, ImageLoader, PrefetchSummary, ALLOWED_FORMATS, DEFAULT_IMAGE_TIMEOUT,
};
pub use policy::{Clock, ManualClock, RefreshPolicy, SystemClock};

#[cfg(test)]
pub(crate) use loader::png_fixture;
