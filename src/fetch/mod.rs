// src/fetch/mod.rs

//! Fetch strategies for monitored sites.
//!
//! - `conditional`: lightweight HTTP GET with ETag revalidation
//! - `render`: full browser-rendered fetch for script-dependent pages

pub mod conditional;
pub mod render;

pub use conditional::{ConditionalFetch, FetchResponse, HttpFetcher};
pub use render::{BrowserRenderer, PageRenderer};
