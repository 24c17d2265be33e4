//! Parent graph for Weft tracked objects.
//!
//! Every tracked instance that is held by another instance's slot has an
//! entry in the [`ParentGraph`]: an ordered multiset of [`Edge`]s naming
//! the holder and the slot (or list element) it is held under.
//!
//! # Structure
//!
//! ```text
//! ParentGraph
//! └── IndexMap<ObjectId (child), SmallVec<[Edge; 2]>>
//!     └── Edge { parent: ObjectId, key: SlotKey { slot, element } }
//! ```
//!
//! Edges for one child keep insertion order. Removing an edge shifts the
//! remaining ones down without reordering them, so the parent sequence seen
//! by readers is always "order of first establishment".

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod edge;
pub mod graph;
pub mod parents;

pub use edge::{Edge, SlotKey};
pub use graph::ParentGraph;
pub use parents::Parents;
