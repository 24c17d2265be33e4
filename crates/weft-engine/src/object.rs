//! Tracked instances: instance storage plus mutation controller.
//!
//! Every write goes through one path:
//!
//! 1. check the value against the slot kind,
//! 2. compare with the current occupant (identical writes are no-ops),
//! 3. swap the stored value,
//! 4. move the parent edge from the old child to the new one,
//! 5. open an epoch on the instance and, transitively, on every PRISTINE
//!    parent.
//!
//! The displaced value is released only after every borrow is dropped, so
//! a child whose last handle lived in the slot is destroyed outside the
//! store's critical sections.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};
use weft_core::{AccessError, ObjectId, SlotId, SlotKind, Version};
use weft_graph::{Parents, SlotKey};

use crate::mutation::{MutationController, MutationState};
use crate::schema::{Schema, SlotDef, SlotDefault};
use crate::settle::ChangeComplete;
use crate::store::{ParentEdge, Store, StoreShared};
use crate::value::Value;

// ── Instance storage ───────────────────────────────────────────────

/// Backing value of one slot, tagged by storage shape.
#[derive(Clone, Debug)]
pub(crate) enum SlotValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl SlotValue {
    fn allocate(def: &SlotDef) -> Self {
        match &def.default {
            SlotDefault::EmptyList => SlotValue::List(Vec::new()),
            _ => SlotValue::Scalar(def.default_value()),
        }
    }

    /// Tracked children held by this slot, with their edge keys.
    fn children(&self, slot: SlotId) -> impl Iterator<Item = (SlotKey, &Object)> {
        let (scalar, list) = match self {
            SlotValue::Scalar(v) => (v.as_object().map(|o| (SlotKey::scalar(slot), o)), None),
            SlotValue::List(items) => (None, Some(items)),
        };
        let elements = list.into_iter().flat_map(move |items| {
            items.iter().enumerate().filter_map(move |(i, v)| {
                v.as_object().map(|o| (SlotKey::element(slot, i as u32), o))
            })
        });
        scalar.into_iter().chain(elements)
    }
}

pub(crate) struct ObjectState {
    slots: Vec<SlotValue>,
    pub(crate) controller: MutationController,
}

impl ObjectState {
    /// Current occupant of a scalar slot or list element. Elements past the
    /// end of a list read as `Unset`.
    fn peek(&self, slot: SlotId, element: Option<usize>) -> Option<&Value> {
        match (self.slots.get(slot.index())?, element) {
            (SlotValue::Scalar(v), None) => Some(v),
            (SlotValue::List(items), Some(i)) => items.get(i),
            _ => None,
        }
    }

    /// Store `value`, returning the displaced occupant. Lists are padded
    /// with `Unset` up to `element`, which callers bound by the store's
    /// list limit.
    fn put(&mut self, slot: SlotId, element: Option<usize>, value: Value) -> Value {
        match (self.slots.get_mut(slot.index()), element) {
            (Some(SlotValue::Scalar(v)), _) => std::mem::replace(v, value),
            (Some(SlotValue::List(items)), Some(i)) => {
                if i >= items.len() {
                    items.resize(i + 1, Value::Unset);
                }
                std::mem::replace(&mut items[i], value)
            }
            _ => Value::Unset,
        }
    }

    fn list(&self, slot: SlotId) -> &[Value] {
        match self.slots.get(slot.index()) {
            Some(SlotValue::List(items)) => items,
            _ => &[],
        }
    }

    fn list_mut(&mut self, slot: SlotId) -> Option<&mut Vec<Value>> {
        match self.slots.get_mut(slot.index()) {
            Some(SlotValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = (SlotKey, &Object)> {
        self.slots
            .iter()
            .enumerate()
            .flat_map(|(i, s)| s.children(SlotId(i as u32)))
    }
}

pub(crate) struct ObjectInner {
    id: ObjectId,
    schema: Schema,
    store: Rc<StoreShared>,
    pub(crate) state: RefCell<ObjectState>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        let held: Vec<(SlotKey, ObjectId)> = self
            .state
            .get_mut()
            .children()
            .map(|(key, child)| (key, child.id()))
            .collect();
        self.store.release(self.id, held);
    }
}

// ── Object ─────────────────────────────────────────────────────────

/// A tracked instance.
///
/// Cloning the handle does not copy the instance: clones share identity,
/// storage and version. The instance lives as long as any handle does,
/// including handles stored in other instances' slots.
///
/// Reads and writes are name-based; the `Result` paths report names the
/// schema does not declare and values that do not fit a primitive slot.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    pub(crate) fn allocate(store: Rc<StoreShared>, schema: Schema) -> Self {
        let slots = schema.slots().iter().map(SlotValue::allocate).collect();
        Self {
            inner: Rc::new(ObjectInner {
                id: ObjectId::next(),
                schema,
                store,
                state: RefCell::new(ObjectState {
                    slots,
                    controller: MutationController::new(),
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ObjectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn shared(&self) -> &Rc<StoreShared> {
        &self.inner.store
    }

    pub(crate) fn state(&self) -> &RefCell<ObjectState> {
        &self.inner.state
    }

    /// Identity of the instance.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// The slot table the instance was built from.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The store the instance belongs to.
    pub fn store(&self) -> Store {
        Store::from_shared(Rc::clone(&self.inner.store))
    }

    // ── Mutation state ─────────────────────────────────────────────

    /// Whether a write has happened since the last freeze.
    pub fn is_mutating(&self) -> bool {
        self.mutation_state() == MutationState::Mutating
    }

    /// Current mutation state.
    pub fn mutation_state(&self) -> MutationState {
        self.inner.state.borrow().controller.state()
    }

    /// Current version. Starts at 1 and advances once per write epoch.
    pub fn version(&self) -> Version {
        self.inner.state.borrow().controller.version()
    }

    /// Outstanding completion requests against the current epoch. A handle
    /// dropped before it resolved no longer counts.
    pub fn number_of_watchers(&self) -> usize {
        self.inner.state.borrow().controller.number_of_watchers()
    }

    /// Request notification when the current epoch has settled.
    ///
    /// On a PRISTINE instance the returned future is ready at once and no
    /// watcher is registered. Otherwise a watcher is registered now, and the
    /// future resolves after the instance and every child below it that is
    /// mutating now have been frozen, children first. Children unlinked
    /// before the first poll are still waited for.
    pub fn change_complete(&self) -> ChangeComplete {
        let watch = self.inner.state.borrow_mut().controller.register_watcher();
        if watch.is_some() {
            self.inner
                .store
                .with_state(|s| s.metrics.watchers_registered += 1);
        }
        ChangeComplete::new(self.clone(), watch)
    }

    /// Parents holding this instance, normalized by edge count.
    pub fn parents(&self) -> Parents<Object> {
        let id = self.id();
        self.inner.store.with_state(|s| {
            s.graph
                .edges(id)
                .iter()
                .filter_map(|e| s.upgrade(e.parent))
                .collect()
        })
    }

    /// Raw ordered `(parent, slot)` records of this instance.
    pub fn parent_edges(&self) -> Vec<ParentEdge> {
        self.store().edges(self)
    }

    // ── Scalar slots ───────────────────────────────────────────────

    /// Read a scalar slot.
    ///
    /// An unset nested slot with a lazy default is filled on first read:
    /// a fresh instance is built, stored and linked. This opens no epoch
    /// on `self` unless the new instance's initializers wrote.
    pub fn get(&self, name: &str) -> Result<Value, AccessError> {
        let def = self.scalar_def(name)?;
        let current = self
            .inner
            .state
            .borrow()
            .peek(def.id(), None)
            .cloned()
            .unwrap_or_default();
        if current.is_unset() && def.is_lazy() {
            return self.materialize(def.id());
        }
        Ok(current)
    }

    /// Write a scalar slot.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), AccessError> {
        let def = self.scalar_def(name)?;
        self.write(def, None, value.into(), false)
    }

    // ── List slots ─────────────────────────────────────────────────

    /// A copy of the sequence held by a list slot.
    pub fn items(&self, name: &str) -> Result<Vec<Value>, AccessError> {
        let def = self.list_def(name)?;
        Ok(self.inner.state.borrow().list(def.id()).to_vec())
    }

    /// Length of a list slot.
    pub fn list_len(&self, name: &str) -> Result<usize, AccessError> {
        let def = self.list_def(name)?;
        Ok(self.inner.state.borrow().list(def.id()).len())
    }

    /// Element `index` of a list slot. Past the end reads as `Unset`.
    pub fn item(&self, name: &str, index: usize) -> Result<Value, AccessError> {
        let def = self.list_def(name)?;
        let state = self.inner.state.borrow();
        Ok(state.list(def.id()).get(index).cloned().unwrap_or_default())
    }

    /// Write element `index` of a list slot, growing it with `Unset` as
    /// needed.
    pub fn set_item(
        &self,
        name: &str,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), AccessError> {
        let def = self.list_def(name)?;
        self.check_index(def, index)?;
        self.write(def, Some(index), value.into(), false)
    }

    /// Append to a list slot. Always a write.
    pub fn push_item(&self, name: &str, value: impl Into<Value>) -> Result<(), AccessError> {
        let def = self.list_def(name)?;
        let len = self.inner.state.borrow().list(def.id()).len();
        self.check_index(def, len)?;
        self.write(def, Some(len), value.into(), true)
    }

    /// Remove and return the last element of a list slot. Popping an empty
    /// list returns `Unset` and is not a write.
    pub fn pop_item(&self, name: &str) -> Result<Value, AccessError> {
        let def = self.list_def(name)?;
        let slot = def.id();
        let popped = {
            let mut state = self.inner.state.borrow_mut();
            let Some(items) = state.list_mut(slot) else {
                return Ok(Value::Unset);
            };
            let index = items.len();
            match items.pop() {
                Some(v) => (index - 1, v),
                None => return Ok(Value::Unset),
            }
        };
        let (index, value) = popped;
        self.inner.store.relink(
            self.id(),
            SlotKey::element(slot, index as u32),
            value.as_object().map(Object::id),
            None,
        );
        self.touch();
        Ok(value)
    }

    /// Replace the whole sequence of a list slot.
    ///
    /// Element-wise identical sequences are a no-op.
    pub fn set_list<I>(&self, name: &str, items: I) -> Result<(), AccessError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let def = self.list_def(name)?;
        self.write_list(def.id(), items.into_iter().map(Into::into).collect())
    }

    // ── Write path ─────────────────────────────────────────────────

    pub(crate) fn write_scalar(&self, slot: SlotId, value: Value) -> Result<(), AccessError> {
        let schema = self.inner.schema.clone();
        match schema.def(slot) {
            Some(def) => self.write(def, None, value, false),
            None => Ok(()),
        }
    }

    pub(crate) fn write_list(&self, slot: SlotId, items: Vec<Value>) -> Result<(), AccessError> {
        let schema = self.inner.schema.clone();
        let Some(def) = schema.def(slot) else {
            return Ok(());
        };
        if let Some(last) = items.len().checked_sub(1) {
            self.check_index(def, last)?;
        }
        for v in &items {
            self.check(def, v)?;
        }
        let old = {
            let mut state = self.inner.state.borrow_mut();
            let Some(current) = state.list_mut(slot) else {
                return Err(AccessError::NotAList {
                    slot: def.name().to_owned(),
                    kind: def.kind(),
                });
            };
            if *current == items {
                return Ok(());
            }
            std::mem::replace(current, items.clone())
        };

        let id = self.id();
        for (i, v) in old.iter().enumerate() {
            if let Some(child) = v.as_object() {
                self.inner
                    .store
                    .relink(id, SlotKey::element(slot, i as u32), Some(child.id()), None);
            }
        }
        for (i, v) in items.iter().enumerate() {
            if let Some(child) = v.as_object() {
                self.inner
                    .store
                    .relink(id, SlotKey::element(slot, i as u32), None, Some(child.id()));
            }
        }
        trace!(object = %id, slot = def.name(), len = items.len(), "list replaced");
        self.touch();
        drop(old);
        Ok(())
    }

    fn write(
        &self,
        def: &SlotDef,
        element: Option<usize>,
        value: Value,
        force: bool,
    ) -> Result<(), AccessError> {
        self.check(def, &value)?;
        let slot = def.id();
        let old = {
            let mut state = self.inner.state.borrow_mut();
            let unchanged = match state.peek(slot, element) {
                Some(current) => *current == value,
                None => value.is_unset(),
            };
            if unchanged && !force {
                return Ok(());
            }
            state.put(slot, element, value.clone())
        };

        let key = match element {
            Some(i) => SlotKey::element(slot, i as u32),
            None => SlotKey::scalar(slot),
        };
        self.inner.store.relink(
            self.id(),
            key,
            old.as_object().map(Object::id),
            value.as_object().map(Object::id),
        );
        trace!(object = %self.id(), slot = def.name(), "write");
        self.touch();
        drop(old);
        Ok(())
    }

    fn check(&self, def: &SlotDef, value: &Value) -> Result<(), AccessError> {
        match (def.kind(), value) {
            (SlotKind::Primitive(t), Value::Primitive(p)) if p.primitive_type() != t => {
                Err(AccessError::TypeMismatch {
                    slot: def.name().to_owned(),
                    expected: t,
                    found: value.describe(),
                })
            }
            (SlotKind::Primitive(t), Value::Object(_) | Value::Opaque(_)) => {
                Err(AccessError::TypeMismatch {
                    slot: def.name().to_owned(),
                    expected: t,
                    found: value.describe(),
                })
            }
            (_, Value::Object(o)) if !Rc::ptr_eq(o.shared(), self.shared()) => {
                Err(AccessError::ForeignObject {
                    slot: def.name().to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    fn check_index(&self, def: &SlotDef, index: usize) -> Result<(), AccessError> {
        let limit = self.inner.store.config.max_list_len;
        if index >= limit {
            return Err(AccessError::IndexOutOfRange {
                slot: def.name().to_owned(),
                index,
                limit,
            });
        }
        Ok(())
    }

    /// Open an epoch on `self` and on every PRISTINE ancestor.
    fn touch(&self) {
        let mut queue = vec![self.clone()];
        while let Some(obj) = queue.pop() {
            let started = obj.inner.state.borrow_mut().controller.begin_write();
            let Some(version) = started else {
                continue;
            };
            debug!(
                object = %obj.id(),
                schema = obj.schema().name(),
                %version,
                "epoch started"
            );
            let id = obj.id();
            let parents: Vec<Object> = self.inner.store.with_state(|s| {
                s.metrics.epochs_started += 1;
                s.pending.insert(id);
                s.graph
                    .distinct_parents(id)
                    .into_iter()
                    .filter_map(|p| s.upgrade(p))
                    .collect()
            });
            queue.extend(parents);
        }
    }

    /// Fill a lazily defaulted nested slot.
    ///
    /// A child whose initializers wrote is already MUTATING; linking it
    /// opens an epoch here so the holder is never PRISTINE above it.
    fn materialize(&self, slot: SlotId) -> Result<Value, AccessError> {
        let Some(schema) = self.inner.schema.lazy_schema(slot) else {
            return Ok(Value::Unset);
        };
        let child = self.store().construct(&schema)?;
        let old = self
            .inner
            .state
            .borrow_mut()
            .put(slot, None, Value::Object(child.clone()));
        self.inner
            .store
            .relink(self.id(), SlotKey::scalar(slot), None, Some(child.id()));
        trace!(
            object = %self.id(),
            child = %child.id(),
            schema = schema.name(),
            "lazy default constructed"
        );
        if child.is_mutating() {
            self.touch();
        }
        drop(old);
        Ok(Value::Object(child))
    }

    // ── Lookup ─────────────────────────────────────────────────────

    fn scalar_def(&self, name: &str) -> Result<&SlotDef, AccessError> {
        let def = self.inner.schema.lookup(name)?;
        if def.kind() == SlotKind::List {
            return Err(AccessError::ListSlot {
                slot: name.to_owned(),
            });
        }
        Ok(def)
    }

    fn list_def(&self, name: &str) -> Result<&SlotDef, AccessError> {
        let def = self.inner.schema.lookup(name)?;
        if def.kind() != SlotKind::List {
            return Err(AccessError::NotAList {
                slot: name.to_owned(),
                kind: def.kind(),
            });
        }
        Ok(def)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Object");
        d.field("id", &self.inner.id)
            .field("schema", &self.inner.schema.name());
        if let Ok(state) = self.inner.state.try_borrow() {
            d.field("version", &state.controller.version())
                .field("state", &state.controller.state());
        }
        d.finish()
    }
}
