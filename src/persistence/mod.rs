//! Storage seams the pipeline depends on and their in-process
//! implementations.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::PersistenceError;
pub use memory::{MemorySnapshotStore, StaticSubscriberDirectory};
pub use traits::{SnapshotStore, SubscriberDirectory};
