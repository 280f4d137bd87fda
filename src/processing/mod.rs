//! Field extraction, embeddings, scoring and ranking

pub mod document;
pub mod text_processor;
pub mod skills;
pub mod fields;
pub mod embeddings;
pub mod scoring;
pub mod roles;
pub mod ranking;
pub mod analyzer;
