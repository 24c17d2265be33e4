//! The order-stable, duplicate-permitting edge store.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use weft_core::ObjectId;

use crate::edge::{Edge, SlotKey};
use crate::parents::Parents;

/// Inline capacity of a child's edge list. Most children have one or two
/// holders.
type EdgeList = SmallVec<[Edge; 2]>;

/// Adjacency from each child to the parents that currently hold it.
///
/// The graph is a plain data structure: it never looks at slot values and
/// never decides whether an edge should exist. Callers add an edge in the
/// same call that stores a tracked child into a slot, and remove it in the
/// same call that overwrites or clears that slot.
///
/// # Ordering
///
/// A child's edges are kept in insertion order. [`remove_edge`] removes the
/// *first* exact `(parent, key)` match and preserves the relative order of
/// the rest.
///
/// [`remove_edge`]: ParentGraph::remove_edge
#[derive(Clone, Debug, Default)]
pub struct ParentGraph {
    edges: IndexMap<ObjectId, EdgeList>,
    edge_count: usize,
}

impl ParentGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with room for `capacity` children.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            edges: IndexMap::with_capacity(capacity),
            edge_count: 0,
        }
    }

    /// Record that `parent` holds `child` under `key`.
    ///
    /// Duplicates are valid: the same parent may hold the same child under
    /// several slots or list elements, and each is a separate edge.
    pub fn add_edge(&mut self, parent: ObjectId, key: SlotKey, child: ObjectId) {
        self.edges
            .entry(child)
            .or_default()
            .push(Edge::new(parent, key));
        self.edge_count += 1;
    }

    /// Remove one `(parent, key)` edge from `child`.
    ///
    /// Returns `false` if no such edge exists. The child's entry is dropped
    /// once its last edge is gone.
    pub fn remove_edge(&mut self, parent: ObjectId, key: SlotKey, child: ObjectId) -> bool {
        let Some(list) = self.edges.get_mut(&child) else {
            return false;
        };
        let Some(pos) = list.iter().position(|e| e.parent == parent && e.key == key) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.edges.swap_remove(&child);
        }
        self.edge_count -= 1;
        true
    }

    /// The ordered edge list of `child` (empty if it has no parents).
    pub fn edges(&self, child: ObjectId) -> &[Edge] {
        self.edges
            .get(&child)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// Parents of `child` in edge order, duplicates preserved, normalized
    /// by edge count.
    pub fn parents(&self, child: ObjectId) -> Parents<ObjectId> {
        self.edges(child).iter().map(|e| e.parent).collect()
    }

    /// Distinct parents of `child`, in order of first appearance.
    pub fn distinct_parents(&self, child: ObjectId) -> IndexSet<ObjectId> {
        self.edges(child).iter().map(|e| e.parent).collect()
    }

    /// Remove the edge list of `child`. Returns the number of edges removed.
    pub fn forget_child(&mut self, child: ObjectId) -> usize {
        let removed = self.edges.swap_remove(&child).map_or(0, |l| l.len());
        self.edge_count -= removed;
        removed
    }

    /// Whether `ancestor` is reachable from `start` by following parent
    /// edges upward. Every object is its own ancestor.
    pub fn is_ancestor(&self, ancestor: ObjectId, start: ObjectId) -> bool {
        if ancestor == start {
            return true;
        }
        let mut seen = IndexSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for e in self.edges(id) {
                if e.parent == ancestor {
                    return true;
                }
                stack.push(e.parent);
            }
        }
        false
    }

    /// Whether adding the edge `parent -> child` would close a cycle.
    pub fn would_cycle(&self, parent: ObjectId, child: ObjectId) -> bool {
        self.is_ancestor(child, parent)
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.edge_count
    }

    /// Whether the graph holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use weft_core::SlotId;

    fn ids(n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| ObjectId::next()).collect()
    }

    const NODE: SlotKey = SlotKey {
        slot: SlotId(1),
        element: None,
    };
    const NODE2: SlotKey = SlotKey {
        slot: SlotId(2),
        element: None,
    };

    #[test]
    fn empty_child_has_no_parents() {
        let g = ParentGraph::new();
        let c = ObjectId::next();
        assert_eq!(g.parents(c), Parents::None);
        assert!(g.edges(c).is_empty());
        assert!(g.is_empty());
    }

    #[test]
    fn single_edge_yields_sole_parent() {
        let mut g = ParentGraph::new();
        let [p, c] = ids(2)[..] else { unreachable!() };
        g.add_edge(p, NODE, c);
        assert_eq!(g.parents(c), Parents::One(p));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn same_parent_two_slots_is_two_edges() {
        let mut g = ParentGraph::new();
        let [p, c] = ids(2)[..] else { unreachable!() };
        g.add_edge(p, NODE, c);
        g.add_edge(p, NODE2, c);
        assert_eq!(g.parents(c), Parents::Many(vec![p, p]));
        assert_eq!(g.distinct_parents(c).len(), 1);

        assert!(g.remove_edge(p, NODE2, c));
        assert_eq!(g.parents(c), Parents::One(p));
        assert!(g.remove_edge(p, NODE, c));
        assert_eq!(g.parents(c), Parents::None);
        assert!(g.edges(c).is_empty());
    }

    #[test]
    fn removal_preserves_order_of_remaining() {
        let mut g = ParentGraph::new();
        let [p1, p2, p3, c] = ids(4)[..] else { unreachable!() };
        g.add_edge(p1, NODE2, c);
        g.add_edge(p2, NODE2, c);
        g.add_edge(p3, NODE2, c);
        assert_eq!(g.parents(c), Parents::Many(vec![p1, p2, p3]));

        g.remove_edge(p2, NODE2, c);
        assert_eq!(g.parents(c), Parents::Many(vec![p1, p3]));
        g.remove_edge(p1, NODE2, c);
        assert_eq!(g.parents(c), Parents::One(p3));
    }

    #[test]
    fn removing_missing_edge_is_noop() {
        let mut g = ParentGraph::new();
        let [p, q, c] = ids(3)[..] else { unreachable!() };
        g.add_edge(p, NODE, c);
        assert!(!g.remove_edge(q, NODE, c));
        assert!(!g.remove_edge(p, NODE2, c));
        assert!(!g.remove_edge(p, NODE, q));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn list_elements_are_distinct_keys() {
        let mut g = ParentGraph::new();
        let [p, c] = ids(2)[..] else { unreachable!() };
        let slot = SlotId(3);
        g.add_edge(p, SlotKey::element(slot, 0), c);
        g.add_edge(p, SlotKey::element(slot, 4), c);
        assert_eq!(g.len(), 2);
        assert!(g.remove_edge(p, SlotKey::element(slot, 4), c));
        assert_eq!(g.edges(c), &[Edge::new(p, SlotKey::element(slot, 0))]);
    }

    #[test]
    fn forget_child_drops_its_edge_list() {
        let mut g = ParentGraph::new();
        let [p, q, a, b] = ids(4)[..] else { unreachable!() };
        g.add_edge(p, NODE, a);
        g.add_edge(q, NODE, a);
        g.add_edge(p, NODE, b);
        assert_eq!(g.forget_child(a), 2);
        assert_eq!(g.parents(a), Parents::None);
        assert_eq!(g.parents(b), Parents::One(p));
        assert_eq!(g.len(), 1);
        assert_eq!(g.forget_child(a), 0);
    }

    #[test]
    fn cycle_detection_walks_upward() {
        let mut g = ParentGraph::new();
        let [a, b, c] = ids(3)[..] else { unreachable!() };
        // a holds b, b holds c
        g.add_edge(a, NODE, b);
        g.add_edge(b, NODE, c);
        assert!(g.would_cycle(c, a));
        assert!(g.would_cycle(a, a));
        assert!(!g.would_cycle(a, c));
        assert!(g.is_ancestor(a, c));
        assert!(!g.is_ancestor(c, a));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(usize, u32),
        Remove(usize, u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4, 0u32..3).prop_map(|(p, s)| Op::Add(p, s)),
            (0usize..4, 0u32..3).prop_map(|(p, s)| Op::Remove(p, s)),
        ]
    }

    proptest! {
        #[test]
        fn matches_vec_model(ops in prop::collection::vec(op(), 0..64)) {
            let parents = ids(4);
            let child = ObjectId::next();
            let mut g = ParentGraph::new();
            let mut model: Vec<(ObjectId, SlotKey)> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(p, s) => {
                        let key = SlotKey::scalar(SlotId(s));
                        g.add_edge(parents[p], key, child);
                        model.push((parents[p], key));
                    }
                    Op::Remove(p, s) => {
                        let key = SlotKey::scalar(SlotId(s));
                        let expected = model.iter().position(|&(mp, mk)| mp == parents[p] && mk == key);
                        let removed = g.remove_edge(parents[p], key, child);
                        prop_assert_eq!(removed, expected.is_some());
                        if let Some(i) = expected {
                            model.remove(i);
                        }
                    }
                }
                let got: Vec<ObjectId> = g.edges(child).iter().map(|e| e.parent).collect();
                let want: Vec<ObjectId> = model.iter().map(|&(p, _)| p).collect();
                prop_assert_eq!(got, want);
                prop_assert_eq!(g.len(), model.len());
                prop_assert_eq!(g.parents(child).len(), model.len());
            }
        }
    }
}
