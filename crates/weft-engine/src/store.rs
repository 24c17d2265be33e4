//! The store: owner of one parent graph and every instance built in it.
//!
//! [`Store`] is a cheap handle (`Rc`). Objects keep their store alive, so
//! dropping the last `Store` handle does not invalidate live instances.
//!
//! Store state lives behind one `RefCell` and is only borrowed for short,
//! non-reentrant sections that never run application code. An instance
//! dropped while that borrow is held (which can happen when the last
//! handle to it is released inside such a section) is queued and forgotten
//! at the start of the next section.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::task::Waker;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};
use weft_core::{AccessError, ObjectId};
use weft_graph::{ParentGraph, SlotKey};

use crate::config::{ConfigError, CyclePolicy, StoreConfig};
use crate::metrics::StoreMetrics;
use crate::object::{Object, ObjectInner};
use crate::schema::{InitContext, Initializer, Schema};
use crate::settle;

// ── StoreState ─────────────────────────────────────────────────────

pub(crate) struct StoreState {
    pub(crate) graph: ParentGraph,
    registry: IndexMap<ObjectId, Weak<ObjectInner>>,
    /// IDs of MUTATING instances, in epoch-start order.
    pub(crate) pending: IndexSet<ObjectId>,
    pub(crate) metrics: StoreMetrics,
}

impl StoreState {
    pub(crate) fn upgrade(&self, id: ObjectId) -> Option<Object> {
        self.registry
            .get(&id)
            .and_then(Weak::upgrade)
            .map(Object::from_inner)
    }

    /// Drop every trace of a destroyed instance. `held` lists the children
    /// its slots still referenced.
    fn forget(&mut self, id: ObjectId, held: &[(SlotKey, ObjectId)]) {
        self.registry.swap_remove(&id);
        self.pending.shift_remove(&id);
        let mut removed = self.graph.forget_child(id);
        for &(key, child) in held {
            if self.graph.remove_edge(id, key, child) {
                removed += 1;
            }
        }
        self.metrics.edges_removed += removed as u64;
        self.metrics.live_objects = self.metrics.live_objects.saturating_sub(1);
        trace!(object = %id, edges = removed, "released");
    }
}

// ── StoreShared ────────────────────────────────────────────────────

pub(crate) struct StoreShared {
    pub(crate) config: StoreConfig,
    state: RefCell<StoreState>,
    graveyard: RefCell<Vec<(ObjectId, Vec<(SlotKey, ObjectId)>)>>,
    settling: Cell<bool>,
    deferred: RefCell<Vec<Waker>>,
}

impl StoreShared {
    fn new(config: StoreConfig) -> Self {
        let graph = ParentGraph::with_capacity(config.edge_capacity);
        Self {
            config,
            state: RefCell::new(StoreState {
                graph,
                registry: IndexMap::new(),
                pending: IndexSet::new(),
                metrics: StoreMetrics::default(),
            }),
            graveyard: RefCell::new(Vec::new()),
            settling: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        }
    }

    /// Run `f` with exclusive access to the store state.
    ///
    /// `f` must not call back into anything that borrows the state.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.borrow_mut();
        let dead = std::mem::take(&mut *self.graveyard.borrow_mut());
        for (id, held) in dead {
            state.forget(id, &held);
        }
        f(&mut state)
    }

    /// Called from the instance destructor.
    pub(crate) fn release(&self, id: ObjectId, held: Vec<(SlotKey, ObjectId)>) {
        match self.state.try_borrow_mut() {
            Ok(mut state) => state.forget(id, &held),
            Err(_) => self.graveyard.borrow_mut().push((id, held)),
        }
    }

    /// Replace the child edge held at `(parent, key)`.
    pub(crate) fn relink(
        &self,
        parent: ObjectId,
        key: SlotKey,
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    ) {
        if old.is_none() && new.is_none() {
            return;
        }
        let check_cycles = self.config.cycle_policy == CyclePolicy::Warn;
        self.with_state(|s| {
            if let Some(child) = old {
                if s.graph.remove_edge(parent, key, child) {
                    s.metrics.edges_removed += 1;
                    trace!(%parent, %child, slot = %key, "edge removed");
                }
            }
            if let Some(child) = new {
                if check_cycles && s.graph.would_cycle(parent, child) {
                    s.metrics.cycles_detected += 1;
                    warn!(
                        store = %self.config.label,
                        %parent,
                        %child,
                        slot = %key,
                        "write closes a reference cycle; settlement order on the cycle is unspecified"
                    );
                }
                s.graph.add_edge(parent, key, child);
                s.metrics.edges_added += 1;
                trace!(%parent, %child, slot = %key, "edge added");
            }
        });
    }

    pub(crate) fn is_settling(&self) -> bool {
        self.settling.get()
    }

    /// Mark a settlement pass as running. Returns `false` if one already is.
    pub(crate) fn begin_settling(&self) -> bool {
        !self.settling.replace(true)
    }

    /// Clear the settling flag and wake every deferred poll.
    pub(crate) fn end_settling(&self) {
        self.settling.set(false);
        let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
        for w in deferred {
            w.wake();
        }
    }

    /// Park a completion poll that arrived during a settlement pass.
    pub(crate) fn defer(&self, waker: &Waker) {
        self.deferred.borrow_mut().push(waker.clone());
    }
}

// ── Store ──────────────────────────────────────────────────────────

/// Owner of a parent graph and the tracked instances built in it.
///
/// Every instance belongs to exactly one store; a slot cannot hold an
/// instance of another store.
#[derive(Clone)]
pub struct Store {
    shared: Rc<StoreShared>,
}

/// One raw `(parent, slot)` record of a child, as seen from outside.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentEdge {
    /// The holding instance.
    pub parent: Object,
    /// Name of the slot in the parent.
    pub slot: String,
    /// Element index when the slot is a list.
    pub element: Option<u32>,
}

impl Store {
    /// Create a store with the default configuration.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(StoreShared::new(StoreConfig::default())),
        }
    }

    /// Create a store with a validated configuration.
    pub fn with_config(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            store = %config.label,
            cycle_policy = ?config.cycle_policy,
            edge_capacity = config.edge_capacity,
            "store created"
        );
        Ok(Self {
            shared: Rc::new(StoreShared::new(config)),
        })
    }

    pub(crate) fn from_shared(shared: Rc<StoreShared>) -> Self {
        Self { shared }
    }

    /// The configuration the store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Build a new instance of `schema`.
    ///
    /// Slots receive their defaults first; initializers then run in slot
    /// order through the write path. An initializer error drops the
    /// partially built instance and is returned.
    pub fn construct(&self, schema: &Schema) -> Result<Object, AccessError> {
        let object = Object::allocate(Rc::clone(&self.shared), schema.clone());
        self.shared.with_state(|s| {
            s.registry.insert(object.id(), object.downgrade());
            s.metrics.live_objects += 1;
        });
        trace!(object = %object.id(), schema = schema.name(), "constructed");

        if !schema.initializers().is_empty() {
            let ctx = InitContext::new(object.clone());
            for (slot, init) in schema.initializers() {
                match init {
                    Initializer::Scalar(f) => object.write_scalar(*slot, f(&ctx)?)?,
                    Initializer::List(f) => object.write_list(*slot, f(&ctx)?)?,
                }
            }
        }
        Ok(object)
    }

    /// A constructor bound to one schema.
    pub fn factory(&self, schema: &Schema) -> Factory {
        Factory {
            store: self.clone(),
            schema: schema.clone(),
        }
    }

    /// Freeze every MUTATING instance, children before parents.
    ///
    /// Resolves all outstanding completion requests. Returns the number of
    /// instances frozen, or 0 if called while another settlement pass is
    /// running.
    pub fn settle_all(&self) -> usize {
        let roots: Vec<Object> = self
            .shared
            .with_state(|s| s.pending.iter().filter_map(|&id| s.upgrade(id)).collect());
        settle::settle(&self.shared, &roots).unwrap_or(0)
    }

    /// Number of MUTATING instances.
    pub fn pending(&self) -> usize {
        self.shared.with_state(|s| s.pending.len())
    }

    /// A snapshot of the store counters.
    pub fn metrics(&self) -> StoreMetrics {
        self.shared.with_state(|s| s.metrics.clone())
    }

    /// Total number of parent edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.shared.with_state(|s| s.graph.len())
    }

    /// The ordered raw edges of `child`.
    pub fn edges(&self, child: &Object) -> Vec<ParentEdge> {
        let raw: Vec<_> = self.shared.with_state(|s| {
            s.graph
                .edges(child.id())
                .iter()
                .filter_map(|e| s.upgrade(e.parent).map(|p| (p, e.key)))
                .collect()
        });
        raw.into_iter()
            .map(|(parent, key)| {
                let slot = parent
                    .schema()
                    .def(key.slot)
                    .map(|d| d.name().to_owned())
                    .unwrap_or_default();
                ParentEdge {
                    parent,
                    slot,
                    element: key.element,
                }
            })
            .collect()
    }

    /// Whether `object` was built by this store.
    pub fn contains(&self, object: &Object) -> bool {
        Rc::ptr_eq(&self.shared, object.shared())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.shared.config.label)
            .field("settling", &self.shared.is_settling())
            .finish_non_exhaustive()
    }
}

// ── Factory ────────────────────────────────────────────────────────

/// Constructor for one schema in one store.
#[derive(Clone, Debug)]
pub struct Factory {
    store: Store,
    schema: Schema,
}

impl Factory {
    /// Build a new instance.
    pub fn construct(&self) -> Result<Object, AccessError> {
        self.store.construct(&self.schema)
    }

    /// The schema instances are built from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The store instances are built in.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SlotSpec;
    use crate::value::Value;
    use weft_graph::Parents;

    fn holder() -> Schema {
        Schema::builder("Holder")
            .slot("a", SlotSpec::nested())
            .slot("b", SlotSpec::nested())
            .build()
            .expect("valid schema")
    }

    #[test]
    fn invalid_config_rejected() {
        let err = Store::with_config(StoreConfig::default().with_label("")).unwrap_err();
        assert_eq!(err, ConfigError::EmptyLabel);
    }

    #[test]
    fn construct_registers_and_drop_releases() {
        let store = Store::new();
        let schema = holder();
        let o = store.construct(&schema).expect("construct");
        assert!(store.contains(&o));
        assert_eq!(store.metrics().live_objects, 1);
        drop(o);
        assert_eq!(store.metrics().live_objects, 0);
    }

    #[test]
    fn dropping_parent_removes_its_edges() {
        let store = Store::new();
        let schema = holder();
        let child = store.construct(&schema).expect("construct");
        let p = store.construct(&schema).expect("construct");
        p.set("a", &child).expect("write");
        p.set("b", &child).expect("write");
        assert_eq!(store.edge_count(), 2);
        let edges = store.edges(&child);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].slot, "a");
        assert_eq!(edges[1].slot, "b");

        drop(p);
        assert_eq!(store.edge_count(), 0);
        assert!(child.parents().is_empty());
        assert_eq!(store.metrics().edges_removed, 2);
    }

    #[test]
    fn dropping_parent_keeps_other_holders() {
        let store = Store::new();
        let schema = holder();
        let child = store.construct(&schema).expect("construct");
        let p = store.construct(&schema).expect("construct");
        let q = store.construct(&schema).expect("construct");
        p.set("a", &child).expect("write");
        q.set("a", &child).expect("write");
        p.set("b", &child).expect("write");

        drop(p);
        assert_eq!(child.parents(), Parents::One(q.clone()));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn dropping_a_chain_releases_every_edge() {
        let store = Store::new();
        let schema = holder();
        let chain: Vec<Object> = (0..100)
            .map(|_| store.construct(&schema).expect("construct"))
            .collect();
        for pair in chain.windows(2) {
            pair[0].set("a", &pair[1]).expect("write");
        }
        assert_eq!(store.edge_count(), 99);

        drop(chain);
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.metrics().live_objects, 0);
        assert_eq!(store.metrics().edges_removed, 99);
    }

    #[test]
    fn cycle_is_recorded_and_counted() {
        let store = Store::new();
        let schema = holder();
        let a = store.construct(&schema).expect("construct");
        let b = store.construct(&schema).expect("construct");
        a.set("a", &b).expect("write");
        b.set("a", &a).expect("write");
        assert_eq!(store.metrics().cycles_detected, 1);
        assert_eq!(store.edge_count(), 2);
        // Break the cycle so both can be released.
        b.set("a", Value::Cleared).expect("write");
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn ignore_policy_skips_cycle_check() {
        let cfg = StoreConfig::default().with_cycle_policy(CyclePolicy::Ignore);
        let store = Store::with_config(cfg).expect("valid config");
        let schema = holder();
        let a = store.construct(&schema).expect("construct");
        a.set("a", &a).expect("write");
        assert_eq!(store.metrics().cycles_detected, 0);
        a.set("a", Value::Cleared).expect("write");
    }

    #[test]
    fn factory_builds_from_its_schema() {
        let store = Store::new();
        let schema = holder();
        let f = store.factory(&schema);
        let o = f.construct().expect("construct");
        assert_eq!(o.schema(), &schema);
        assert_eq!(f.store(), &store);
    }
}
