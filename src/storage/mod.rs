//! Durable client storage — a small synchronous key-value seam.
//!
//! The flow store and the stable user id each persist one document under a
//! fixed key. Any backend that can get/set/remove strings works.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
