//! Utility functions for code generation and URL validation.
//!
//! - [`code_generator`] - Short code generation and shape checks
//! - [`url_validator`] - Origin URL validation

pub mod code_generator;
pub mod url_validator;
