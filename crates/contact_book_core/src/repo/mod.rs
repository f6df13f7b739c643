//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the contact store contract used by the service layer.
//! - Isolate SQLite query details from command orchestration.
//!
//! # Invariants
//! - Filters and patches are structured values; SQL text is assembled only
//!   from fixed column names and numbered placeholders.

pub mod contact_repo;
pub mod filter;
