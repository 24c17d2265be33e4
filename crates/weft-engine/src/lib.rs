//! Tracked-object engine for Weft.
//!
//! Turns slot tables built with [`Schema::builder`] into tracked
//! instances whose writes are versioned and propagated through the
//! store's parent graph. Completion requests ([`Object::change_complete`])
//! resolve once the instance's write epoch has been frozen, with every
//! mutating child frozen strictly before the parents that hold it.
//!
//! # Architecture
//!
//! ```text
//! Store (Rc, one per object graph)
//! ├── StoreConfig / StoreMetrics
//! ├── ParentGraph (child → ordered (parent, slot) edges)
//! ├── registry (ObjectId → Weak<object>)
//! └── pending (ids of MUTATING objects)
//!
//! Object (Rc)
//! ├── Schema (slot table, shared by every instance of the type)
//! ├── slots: Vec<SlotValue> (instance storage)
//! └── MutationController (state, version, epoch watch)
//! ```
//!
//! Everything here is single-threaded: objects, stores and completion
//! futures are `!Send`. Suspension happens only where a
//! [`ChangeComplete`] future is awaited.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod mutation;
pub mod object;
pub mod ops;
pub mod schema;
pub mod settle;
pub mod store;
pub mod value;

pub use config::{ConfigError, CyclePolicy, StoreConfig, MAX_EDGE_CAPACITY, MAX_LIST_LEN};
pub use error::WeftError;
pub use metrics::StoreMetrics;
pub use mutation::MutationState;
pub use object::Object;
pub use schema::{InitContext, Schema, SchemaBuilder, SlotDef, SlotSpec};
pub use settle::ChangeComplete;
pub use store::{Factory, ParentEdge, Store};
pub use value::{is_data_object, Opaque, Value};
