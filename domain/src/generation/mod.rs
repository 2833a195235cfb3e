//! Generation domain module
//!
//! What a generation backend receives ([`GenerationContext`]) and what a
//! streaming backend yields ([`StreamEvent`]).

pub mod context;
pub mod stream;

pub use context::GenerationContext;
pub use stream::StreamEvent;
