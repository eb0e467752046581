//! Core types for HTTP request/response handling.
//!
//! This module provides the fundamental types the compression layer operates
//! on:
//!
//! - [`Request`] - HTTP request abstraction
//! - [`Response`] - HTTP response abstraction with builder pattern
//! - [`Body`] - response body variants (buffer, JSON, stream)

mod body;
mod request;
mod response;

pub use body::{Body, ByteStream};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
