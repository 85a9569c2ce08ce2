//! Wire models: error envelope and request/response DTOs.

pub mod dto;
pub mod error;

pub use dto::*;
pub use error::ErrorResponse;
