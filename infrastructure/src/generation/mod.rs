//! Generation adapters implementing the
//! [`GenerationBackend`](roundtable_application::GenerationBackend) port.

mod scripted;

pub use scripted::ScriptedBackend;
