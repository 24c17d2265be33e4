//! Core types for the Weft reactive object engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: object, schema and
//! slot identifiers, the [`Version`] counter, slot kinds with their
//! primitive defaults, and the error enums returned by the engine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod slot;

pub use error::{AccessError, SchemaError};
pub use id::{ObjectId, SchemaId, SlotId, Version};
pub use slot::{Absence, Primitive, PrimitiveType, SlotKind};
