//! Virtual try-on job service
//!
//! Accepts a person image and a clothing image, hands them to a third-party
//! image-generation API in the background, and lets clients poll a persisted
//! job record until the composited result (or a failure) is available.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
