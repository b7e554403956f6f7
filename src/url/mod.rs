//! URL handling module for hunt
//!
//! This module provides URL normalization (the dedup identity of a discovery)
//! and domain extraction (the key of the per-domain rate limiter).

mod domain;
mod normalize;

pub use domain::{domain_of, extract_domain, is_onion};
pub use normalize::normalize_url;
