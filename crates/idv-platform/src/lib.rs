//! Identity Verification Platform
//!
//! Reconciles provider-verified identity documents against self-reported
//! user records:
//! - Webhook signature verification
//! - Field normalization and calendar age computation
//! - Strict and lenient reconciliation policies
//! - MongoDB user store and auth-identity deletion adapters
//! - Identity provider REST client
//! - HTTP endpoints for event delivery and session creation

pub mod accounts;
pub mod api;
pub mod domain;
pub mod error;
pub mod provider;
pub mod repository;
pub mod service;

pub use error::{PlatformError, Result};
