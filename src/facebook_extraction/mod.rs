// src/facebook_extraction/mod.rs
//! Facebook post ingestion: an LLM pass over text and screenshots with
//! regex matchers filling any field the model leaves out.
pub mod extractor;
pub mod heuristics;

pub use extractor::FacebookExtractor;
