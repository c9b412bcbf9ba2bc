//! Dessert Cookbook Library
//!
//! Recipe fetching and ingredient decoding, the bookmark store and the image
//! cache, exposed for the binary and for integration tests.

pub mod app;
pub mod bookmarks;
pub mod cache;
pub mod cli;
pub mod data;
pub mod storage;
