//! Contact book domain model.
//!
//! # Responsibility
//! - Define the contact record shared by repository, service and CLI.
//! - Keep normalization and age rules in one place.

pub mod contact;
