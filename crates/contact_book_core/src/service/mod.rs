//! Use-case services for command entry points.
//!
//! # Responsibility
//! - Orchestrate contact commands on top of repository contracts.
//! - Keep command semantics independent from the CLI front-end.

pub mod contact_service;
