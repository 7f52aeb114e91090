//! Backend for the Penn State sublease marketplace.
//!
//! Students list and browse subleases and post housing requests, property
//! agencies register and publish listings with floor plans, and Facebook
//! group posts are ingested through an LLM-assisted extraction pipeline.

/// Forward to the matching `tracing` macro, e.g. `app_log!(info, "x = {}", x)`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

pub mod admin_cli;
pub mod auth;
pub mod core;
pub mod facebook_extraction;
pub mod repository;
pub mod types;
pub mod utils;
pub mod web;

pub use web::{build_rocket, start_web_server};
