//! Core domain concepts shared across all subdomains.
//!
//! - [`ids`]: identifiers for agents, discussions and messages
//! - [`error::DomainError`]: domain-level errors (rejected transitions)
//! - [`string`]: text helpers for previews

pub mod error;
pub mod ids;
pub mod string;
