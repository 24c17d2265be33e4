//! Weft: reactive, versioned objects with bottom-up settlement.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Weft sub-crates. For most users, adding `weft` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use weft::prelude::*;
//! use futures::executor::block_on;
//!
//! let store = Store::new();
//! let node = Schema::builder("Node")
//!     .slot("value", SlotSpec::string().default("v1"))
//!     .slot("child", SlotSpec::nested().nullable())
//!     .build()
//!     .unwrap();
//!
//! let parent = store.construct(&node).unwrap();
//! let child = store.construct(&node).unwrap();
//!
//! parent.set("child", &child).unwrap();
//! assert_eq!(get_parents(&child), Parents::One(parent.clone()));
//!
//! child.set("value", "v2").unwrap();
//! assert!(is_mutating(&parent));
//! assert_eq!(version(&parent), Version(2));
//!
//! // Children freeze before the parents that hold them.
//! let settled = block_on(change_complete(&parent));
//! assert_eq!(settled, parent);
//! assert!(!is_mutating(&child));
//! assert!(!is_mutating(&parent));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `weft-core` | IDs, `Version`, slot kinds, error enums |
//! | [`graph`] | `weft-graph` | `ParentGraph`, edges, normalized `Parents` |
//! | [`engine`] | `weft-engine` | schemas, objects, store, settlement |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and IDs (`weft-core`).
pub use weft_core as types;

/// Parent graph storage (`weft-graph`).
///
/// Most users only reach the graph through [`engine::Object::parents`] and
/// [`engine::Store::edges`].
pub use weft_graph as graph;

/// Schemas, tracked objects, stores and settlement (`weft-engine`).
pub use weft_engine as engine;

pub use weft_engine::ops::{
    change_complete, get_parents, is_data_object, is_mutating, number_of_watchers, version,
};

/// Common imports for typical Weft usage.
///
/// ```rust
/// use weft::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use weft_core::{Absence, Primitive, PrimitiveType, SlotKind, Version};

    // Errors
    pub use weft_core::{AccessError, SchemaError};
    pub use weft_engine::{ConfigError, WeftError};

    // Graph
    pub use weft_graph::Parents;

    // Engine
    pub use weft_engine::{
        ChangeComplete, CyclePolicy, Factory, Object, Opaque, Schema, SchemaBuilder, SlotSpec,
        Store, StoreConfig, StoreMetrics, Value,
    };

    // Query surface
    pub use crate::{
        change_complete, get_parents, is_data_object, is_mutating, number_of_watchers, version,
    };
}
