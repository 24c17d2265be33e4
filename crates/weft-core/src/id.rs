//! Strongly-typed identifiers and the per-object [`Version`] counter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`ObjectId`] allocation.
static OBJECT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`SchemaId`] allocation.
static SCHEMA_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a tracked instance.
///
/// Allocated from a process-wide monotonic counter via [`ObjectId::next`],
/// so two instances never share an ID even when they live in different
/// stores. IDs are never reused after the instance is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh, unique object ID.
    pub fn next() -> Self {
        Self(OBJECT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a built schema (slot table).
///
/// Every call to the schema builder's `build()` allocates a new ID, including
/// schemas derived from a base schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

impl SchemaId {
    /// Allocate a fresh, unique schema ID.
    pub fn next() -> Self {
        Self(SCHEMA_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a slot within a schema's slot table.
///
/// `SlotId(n)` is the n-th declared slot. Derived schemas keep the slot
/// IDs of their base and append new slots after them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    /// The slot index as a `usize`, for indexing instance storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Per-instance change counter.
///
/// Starts at [`Version::INITIAL`] when the instance is constructed and is
/// advanced by exactly one at the start of every write epoch. Never
/// decreases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

impl Version {
    /// Version of a freshly constructed instance.
    pub const INITIAL: Version = Version(1);

    /// The version allocated for the next epoch.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl PartialEq<u64> for Version {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn object_ids_are_unique() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn version_starts_at_one_and_advances_by_one() {
        let v = Version::default();
        assert_eq!(v, Version::INITIAL);
        assert_eq!(v, 1);
        assert_eq!(v.next(), 2);
        assert_eq!(v.next().next(), Version(3));
    }

    proptest! {
        #[test]
        fn version_chain_is_strictly_increasing(steps in 0u64..500) {
            let mut v = Version::INITIAL;
            for _ in 0..steps {
                let n = v.next();
                prop_assert!(n > v);
                v = n;
            }
            prop_assert_eq!(v, Version(1 + steps));
        }
    }

    #[test]
    fn display_formats() {
        assert_eq!(SlotId(4).to_string(), "4");
        assert_eq!(Version(7).to_string(), "7");
        assert!(ObjectId::next().to_string().starts_with('#'));
    }
}
