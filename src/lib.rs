//! Builds the initial in-memory image heap of a statically compiled program
//! from a root set of host objects: traverses the object graph, canonicalizes
//! value-equal duplicates, partitions objects by writability and reference
//! content, and emits them into relocatable byte buffers.

pub mod canon;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod heap;
pub mod host;
pub mod intern;
pub mod metadata;
pub mod object_info;
pub mod partition;
pub mod phase;
pub mod relocatable_buffer;
pub mod worklist;

pub use error::Error;
pub use heap::NativeImageHeap;
