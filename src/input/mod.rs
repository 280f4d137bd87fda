//! Input processing module
//! Handles format detection, text extraction, and normalisation

pub mod file_detector;
pub mod text_extractor;
pub mod manager;

pub use file_detector::DocumentFormat;
pub use manager::{Document, InputManager};
