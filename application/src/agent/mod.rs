//! Agent turn-taking
//!
//! - [`AgentRuntime`]: one agent's evaluate / request / speak cycle
//! - [`AgentRegistry`]: the agent set of the active discussion

mod registry;
mod runtime;

pub use registry::{AgentRegistry, SyncReport};
pub use runtime::{AgentEnvironment, AgentRuntime};
