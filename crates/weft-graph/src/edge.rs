//! Edge records stored in the parent graph.

use std::fmt;

use weft_core::{ObjectId, SlotId};

/// Location inside a parent that holds a child.
///
/// Scalar slots use `element: None`. List slots record the element index,
/// so a list holding the same child at two indices yields two distinct
/// keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey {
    /// Slot in the parent's slot table.
    pub slot: SlotId,
    /// Element index for list slots.
    pub element: Option<u32>,
}

impl SlotKey {
    /// Key for a scalar slot.
    pub fn scalar(slot: SlotId) -> Self {
        Self {
            slot,
            element: None,
        }
    }

    /// Key for element `index` of a list slot.
    pub fn element(slot: SlotId, index: u32) -> Self {
        Self {
            slot,
            element: Some(index),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.element {
            Some(i) => write!(f, "{}[{i}]", self.slot),
            None => write!(f, "{}", self.slot),
        }
    }
}

/// One `(parent, slot)` record in a child's edge list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// The instance holding the child.
    pub parent: ObjectId,
    /// Where in the parent the child is held.
    pub key: SlotKey,
}

impl Edge {
    /// Construct an edge record.
    pub fn new(parent: ObjectId, key: SlotKey) -> Self {
        Self { parent, key }
    }
}
