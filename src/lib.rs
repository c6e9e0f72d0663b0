// src/lib.rs

//! sitewatch Library
//!
//! Monitors a configured set of web pages for content changes, fetching
//! each either with a conditional HTTP GET or a headless-browser render,
//! and notifies a sink when a page's fingerprint changes.

pub mod config;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod server;
