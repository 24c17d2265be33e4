//! Free-function query surface.
//!
//! Thin wrappers over the [`Object`] methods, for callers that prefer
//! `is_mutating(&x)` over `x.is_mutating()`.

use weft_core::Version;
use weft_graph::Parents;

use crate::object::Object;
use crate::settle::ChangeComplete;

pub use crate::value::is_data_object;

/// Whether `object` has a write since its last freeze.
pub fn is_mutating(object: &Object) -> bool {
    object.is_mutating()
}

/// Current version of `object`.
pub fn version(object: &Object) -> Version {
    object.version()
}

/// Outstanding completion requests against the current epoch of `object`.
pub fn number_of_watchers(object: &Object) -> usize {
    object.number_of_watchers()
}

/// Completion handle for the current epoch of `object`.
pub fn change_complete(object: &Object) -> ChangeComplete {
    object.change_complete()
}

/// Parents of `object`: none, the sole parent, or every parent in edge
/// order with duplicates.
pub fn get_parents(object: &Object) -> Parents<Object> {
    object.parents()
}
