//! Storage adapters implementing the
//! [`DiscussionRepository`](roundtable_application::DiscussionRepository) port.

mod memory;

pub use memory::InMemoryDiscussionRepository;
