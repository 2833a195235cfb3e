//! Port definitions (interfaces for infrastructure adapters)

pub mod generation;
pub mod storage;
pub mod transcript;
