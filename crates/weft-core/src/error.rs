//! Error types for the Weft object engine.
//!
//! Split by the phase that reports them: [`SchemaError`] when a slot table
//! is built, [`AccessError`] when application code reads or writes a slot
//! through the name-based accessor surface.

use thiserror::Error;

use crate::slot::{PrimitiveType, SlotKind};

/// Errors detected while building a schema.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The schema name is empty.
    #[error("schema name must not be empty")]
    EmptyName,
    /// Two slots were declared with the same name in one builder.
    #[error("schema '{schema}' declares slot '{slot}' twice")]
    DuplicateSlot {
        /// Name of the schema being built.
        schema: String,
        /// The duplicated slot name.
        slot: String,
    },
    /// An initializer names a slot that does not exist.
    #[error("schema '{schema}' has no slot '{slot}'")]
    UnknownSlot {
        /// Name of the schema being built.
        schema: String,
        /// The unknown slot name.
        slot: String,
    },
    /// A literal default does not match the slot's primitive type.
    #[error("default for slot '{slot}' must be a {expected}, got a {found}")]
    DefaultTypeMismatch {
        /// The slot whose default is wrong.
        slot: String,
        /// The declared primitive type.
        expected: PrimitiveType,
        /// The type of the supplied default.
        found: PrimitiveType,
    },
    /// A slot option or initializer does not apply to the slot's kind.
    #[error("slot '{slot}' of kind {kind} does not support {option}")]
    KindMismatch {
        /// The slot the option was applied to.
        slot: String,
        /// The slot's kind.
        kind: SlotKind,
        /// Description of the unsupported option.
        option: &'static str,
    },
    /// A derived schema redeclared an inherited slot with a different kind.
    #[error("slot '{slot}' is inherited as {inherited} and cannot be redeclared as {declared}")]
    OverrideKind {
        /// The overridden slot.
        slot: String,
        /// Kind declared by the base schema.
        inherited: SlotKind,
        /// Kind of the new declaration.
        declared: SlotKind,
    },
}

/// Errors from reading or writing a slot by name.
///
/// None of these occur under well-typed use: they report a slot name the
/// schema does not declare, a list operation on a scalar slot (or the
/// reverse), a value that does not fit a primitive slot, a tracked
/// instance that belongs to a different store, or a list index past the
/// store's length limit.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The schema has no slot with this name.
    #[error("'{schema}' has no slot '{slot}'")]
    UnknownSlot {
        /// Name of the instance's schema.
        schema: String,
        /// The requested slot name.
        slot: String,
    },
    /// A list operation was applied to a non-list slot.
    #[error("slot '{slot}' is {kind}, not a list")]
    NotAList {
        /// The slot name.
        slot: String,
        /// The slot's actual kind.
        kind: SlotKind,
    },
    /// A scalar write was applied to a list slot.
    #[error("slot '{slot}' is a list; use the list accessors")]
    ListSlot {
        /// The slot name.
        slot: String,
    },
    /// The value does not fit the slot's primitive type.
    #[error("slot '{slot}' expects a {expected}, got {found}")]
    TypeMismatch {
        /// The slot name.
        slot: String,
        /// The declared primitive type.
        expected: PrimitiveType,
        /// Short description of the rejected value.
        found: &'static str,
    },
    /// A tracked instance from another store was written into a slot.
    #[error("slot '{slot}' cannot reference an instance owned by another store")]
    ForeignObject {
        /// The slot name.
        slot: String,
    },
    /// A list write would grow the list past the store's length limit.
    #[error("index {index} of list slot '{slot}' is past the limit of {limit} elements")]
    IndexOutOfRange {
        /// The slot name.
        slot: String,
        /// The requested element index.
        index: usize,
        /// Maximum list length of the store.
        limit: usize,
    },
}
