//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Validate boundary parameters once, before they reach a repository.

pub mod organization_service;
