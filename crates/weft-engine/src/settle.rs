//! Settlement engine.
//!
//! A settlement pass freezes a set of MUTATING instances so that every
//! child is frozen strictly before any parent that holds it:
//!
//! 1. **Plan**: iterative post-order walk from each root over the tracked
//!    children that are MUTATING. A visited set makes each instance appear
//!    once and stops the walk on reference cycles.
//! 2. **Freeze**: in plan order, return each instance to PRISTINE, take
//!    its epoch watch, and resolve it (waking every parked completion).
//!
//! Passes do not nest. A completion future polled while a pass is running
//! parks itself and is woken when the pass ends.

use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use indexmap::IndexSet;
use tracing::{debug, debug_span, trace};
use weft_core::ObjectId;

use crate::mutation::EpochWatch;
use crate::object::{Object, ObjectInner};
use crate::store::StoreShared;

/// Mutating tracked children of `obj`, in slot order, without duplicates.
fn mutating_children(obj: &Object) -> Vec<Object> {
    let state = obj.state().borrow();
    let mut seen = IndexSet::new();
    let children: Vec<Object> = state
        .children()
        .filter(|(_, child)| *child != obj && seen.insert(child.id()))
        .filter(|(_, child)| child.is_mutating())
        .map(|(_, child)| child.clone())
        .collect();
    children
}

/// Append the post-order of the mutating subgraph below `root` to `order`.
pub(crate) fn plan_into(root: &Object, visited: &mut IndexSet<ObjectId>, order: &mut Vec<Object>) {
    if !root.is_mutating() || !visited.insert(root.id()) {
        return;
    }
    let mut stack = vec![(root.clone(), mutating_children(root).into_iter())];
    while let Some((_, children)) = stack.last_mut() {
        match children.next() {
            Some(child) => {
                if visited.insert(child.id()) {
                    let grandchildren = mutating_children(&child).into_iter();
                    stack.push((child, grandchildren));
                }
            }
            None => {
                if let Some((done, _)) = stack.pop() {
                    order.push(done);
                }
            }
        }
    }
}

/// Return `obj` to PRISTINE and resolve its epoch watch.
fn freeze(store: &StoreShared, obj: &Object) -> bool {
    let (watch, version) = {
        let mut state = obj.state().borrow_mut();
        if !state.controller.is_mutating() {
            return false;
        }
        (state.controller.freeze(), state.controller.version())
    };
    let id = obj.id();
    store.with_state(|s| {
        s.pending.shift_remove(&id);
        s.metrics.freezes += 1;
    });
    trace!(
        object = %id,
        %version,
        watchers = watch.as_ref().map_or(0, |w| w.outstanding()),
        "frozen"
    );
    if let Some(w) = watch {
        w.resolve();
    }
    true
}

/// Run one settlement pass over `roots`.
///
/// Returns the number of instances frozen, or `None` if a pass is already
/// running on this store.
pub(crate) fn settle(store: &Rc<StoreShared>, roots: &[Object]) -> Option<usize> {
    if !store.begin_settling() {
        return None;
    }
    let span = debug_span!("settle", store = %store.config.label, roots = roots.len());
    let _enter = span.enter();

    let mut visited = IndexSet::new();
    let mut order = Vec::new();
    for root in roots {
        plan_into(root, &mut visited, &mut order);
    }
    let frozen = order.iter().filter(|o| freeze(store, o)).count();
    store.with_state(|s| s.metrics.settlements += 1);
    debug!(frozen, "settled");

    store.end_settling();
    Some(frozen)
}

// ── ChangeComplete ─────────────────────────────────────────────────

/// Completion handle returned by [`Object::change_complete`].
///
/// Resolves to the instance once the epoch that was current at the call
/// has been frozen. The watcher is registered when the handle is created;
/// the settlement pass runs on first poll. Every poll after resolution
/// yields the instance again.
///
/// The mutating subgraph below the instance is recorded at creation. Those
/// children are settled first even if a write unlinks them before the
/// first poll. Dropping an unresolved handle withdraws its registration.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ChangeComplete {
    object: Object,
    watch: Option<Rc<EpochWatch>>,
    /// Mutating descendants at creation, children first.
    pinned: Vec<Weak<ObjectInner>>,
}

impl ChangeComplete {
    pub(crate) fn new(object: Object, watch: Option<Rc<EpochWatch>>) -> Self {
        let pinned = match watch {
            Some(_) => {
                let mut order = Vec::new();
                plan_into(&object, &mut IndexSet::new(), &mut order);
                order
                    .iter()
                    .filter(|o| **o != object)
                    .map(Object::downgrade)
                    .collect()
            }
            None => Vec::new(),
        };
        Self {
            object,
            watch,
            pinned,
        }
    }

    /// Recorded descendants still alive, followed by the instance itself.
    fn roots(&self) -> Vec<Object> {
        self.pinned
            .iter()
            .filter_map(Weak::upgrade)
            .map(Object::from_inner)
            .chain(std::iter::once(self.object.clone()))
            .collect()
    }

    /// The instance this handle resolves to.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Whether the handle would resolve on its next poll without running a
    /// settlement pass.
    pub fn is_settled(&self) -> bool {
        self.watch.as_ref().map_or(true, |w| w.is_resolved())
    }
}

impl Future for ChangeComplete {
    type Output = Object;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Object> {
        let this = self.get_mut();
        let Some(watch) = &this.watch else {
            return Poll::Ready(this.object.clone());
        };
        if !watch.is_resolved() {
            let store = Rc::clone(this.object.shared());
            if settle(&store, &this.roots()).is_none() {
                watch.park(cx.waker());
                store.defer(cx.waker());
                return Poll::Pending;
            }
            if !watch.is_resolved() {
                watch.park(cx.waker());
                return Poll::Pending;
            }
        }
        Poll::Ready(this.object.clone())
    }
}

impl Drop for ChangeComplete {
    fn drop(&mut self) {
        if let Some(watch) = &self.watch {
            watch.unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SlotSpec};
    use crate::store::Store;
    use futures::executor::block_on;
    use futures::FutureExt;

    fn node() -> Schema {
        Schema::builder("Node")
            .slot("value", SlotSpec::string())
            .slot("a", SlotSpec::nested())
            .slot("b", SlotSpec::nested())
            .build()
            .expect("valid schema")
    }

    fn plan(root: &Object) -> Vec<ObjectId> {
        let mut order = Vec::new();
        plan_into(root, &mut IndexSet::new(), &mut order);
        order.iter().map(Object::id).collect()
    }

    #[test]
    fn plan_is_children_first() {
        let store = Store::new();
        let s = node();
        let root = store.construct(&s).expect("construct");
        let left = store.construct(&s).expect("construct");
        let right = store.construct(&s).expect("construct");
        let leaf = store.construct(&s).expect("construct");
        root.set("a", &left).expect("write");
        root.set("b", &right).expect("write");
        left.set("a", &leaf).expect("write");
        leaf.set("value", "x").expect("write");
        right.set("value", "y").expect("write");

        assert_eq!(
            plan(&root),
            vec![leaf.id(), left.id(), right.id(), root.id()]
        );
    }

    #[test]
    fn plan_skips_pristine_subtrees() {
        let store = Store::new();
        let s = node();
        let root = store.construct(&s).expect("construct");
        let child = store.construct(&s).expect("construct");
        root.set("a", &child).expect("write");
        assert_eq!(plan(&root), vec![root.id()]);
        assert!(plan(&child).is_empty());
    }

    #[test]
    fn plan_visits_shared_child_once() {
        let store = Store::new();
        let s = node();
        let root = store.construct(&s).expect("construct");
        let child = store.construct(&s).expect("construct");
        root.set("a", &child).expect("write");
        root.set("b", &child).expect("write");
        child.set("value", "x").expect("write");
        assert_eq!(plan(&root), vec![child.id(), root.id()]);
    }

    #[test]
    fn plan_terminates_on_cycles() {
        let store = Store::new();
        let s = node();
        let a = store.construct(&s).expect("construct");
        let b = store.construct(&s).expect("construct");
        a.set("a", &b).expect("write");
        b.set("a", &a).expect("write");
        let order = plan(&a);
        assert_eq!(order.len(), 2);
        assert_eq!(store.settle_all(), 2);
        assert!(!a.is_mutating() && !b.is_mutating());
        b.set("a", crate::value::Value::Cleared).expect("write");
    }

    #[test]
    fn pristine_handle_is_ready_immediately() {
        let store = Store::new();
        let n = store.construct(&node()).expect("construct");
        let cc = n.change_complete();
        assert!(cc.is_settled());
        assert_eq!(n.number_of_watchers(), 0);
        assert_eq!(cc.now_or_never(), Some(n.clone()));
        assert_eq!(store.metrics().settlements, 0);
    }

    #[test]
    fn first_poll_settles() {
        let store = Store::new();
        let n = store.construct(&node()).expect("construct");
        n.set("value", "v2").expect("write");
        let cc = n.change_complete();
        assert!(!cc.is_settled());
        assert_eq!(n.number_of_watchers(), 1);
        let out = block_on(cc);
        assert_eq!(out, n);
        assert!(!n.is_mutating());
        assert_eq!(n.number_of_watchers(), 0);
        assert_eq!(store.metrics().settlements, 1);
        assert_eq!(store.metrics().freezes, 1);
    }

    #[test]
    fn handle_from_settled_epoch_stays_ready() {
        let store = Store::new();
        let n = store.construct(&node()).expect("construct");
        n.set("value", "v2").expect("write");
        let early = n.change_complete();
        store.settle_all();
        // A new epoch does not hold back a handle registered on the old one.
        n.set("value", "v3").expect("write");
        assert!(early.is_settled());
        assert_eq!(early.now_or_never(), Some(n.clone()));
        assert!(n.is_mutating());
    }
}
