//! Shared data types for the scheduled events coordinator.
//!
//! This crate provides:
//! - The notification document schema as served by the instance metadata endpoint
//! - The RFC 1123 timestamp codec used for `NotBefore`
//! - The request body used to expedite (approve) events
#![expect(
    clippy::missing_errors_doc,
    reason = "The situation it maps to errors should be obvious."
)]

mod approval;
mod document;
pub mod rfc1123;

pub use approval::*;
pub use document::*;
