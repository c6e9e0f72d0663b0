// src/models/mod.rs

//! Data model types for site monitoring.

pub mod site;
pub mod state;

pub use site::Site;
pub use state::{CheckOutcome, RoundSummary, SiteState};
