//! Core data models for blog generation requests.

mod request;

pub use request::{GenerationRequest, Style, ValidationError, WordCount};
