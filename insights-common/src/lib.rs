//! # Insights Common Library
//!
//! Shared code for the insights services:
//! - Error and result types
//! - Configuration loading and data folder resolution
//! - Database pool initialization
//! - Pipeline event types and the EventBus
//! - Server-Sent Events helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
