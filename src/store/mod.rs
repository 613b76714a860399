//! Record tables shared by the authentication components.
//!
//! Storage is a seam in this crate: components talk to key-indexed tables
//! through the [`MemoryTable`] surface (`get` / `put` / `delete` / atomic
//! `update` closures / `sweep`), and never to a storage engine directly.
//! The shipped backing is in-process memory with sharded locks; a deployment
//! that needs durability swaps the backing behind this module without
//! touching the components.

pub mod errors;
pub mod memory;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryTable;
