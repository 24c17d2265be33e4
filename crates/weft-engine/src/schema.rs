//! Slot tables and the builder that produces them.
//!
//! A [`Schema`] is built once per type and shared by every instance. It
//! maps slot names to a [`SlotId`], a [`SlotKind`] and a default, and it
//! carries the per-slot initializers that run at construction time.
//!
//! ```text
//! Schema::builder("TestNode")
//!     .slot("value", SlotSpec::string().default("v1"))   literal default, not a write
//!     .slot("node", SlotSpec::nested().lazy_self())      built on first read
//!     .slot("node2", SlotSpec::nested().nullable())      defaults to Cleared
//!     .init("value", |_| Ok("v42"))                      runs through the write path
//!     .build()?
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use weft_core::{
    Absence, AccessError, Primitive, PrimitiveType, SchemaError, SchemaId, SlotId, SlotKind,
};

use crate::object::Object;
use crate::store::Store;
use crate::value::Value;

type ScalarInit = Rc<dyn Fn(&InitContext) -> Result<Value, AccessError>>;
type ListInit = Rc<dyn Fn(&InitContext) -> Result<Vec<Value>, AccessError>>;

/// Per-slot initializer, evaluated once per construction.
#[derive(Clone)]
pub(crate) enum Initializer {
    Scalar(ScalarInit),
    List(ListInit),
}

impl Initializer {
    fn describe(&self) -> &'static str {
        match self {
            Initializer::Scalar(_) => "a scalar initializer",
            Initializer::List(_) => "a list initializer",
        }
    }
}

/// Schema to construct when a nested slot is first read while unset.
#[derive(Clone, Debug)]
pub(crate) enum LazyDefault {
    /// The schema the slot is declared on.
    This,
    Schema(Schema),
}

/// Default stored in a freshly allocated instance.
#[derive(Clone, Debug)]
pub(crate) enum SlotDefault {
    Primitive(Primitive),
    Absent(Absence),
    Lazy(LazyDefault),
    EmptyList,
}

// ── SlotSpec ───────────────────────────────────────────────────────

/// Declaration of one slot, passed to [`SchemaBuilder::slot`].
///
/// Options that do not apply to the slot's kind are reported by
/// [`SchemaBuilder::build`] as [`SchemaError::KindMismatch`].
#[derive(Clone, Debug)]
pub struct SlotSpec {
    kind: SlotKind,
    default: Option<SpecDefault>,
}

#[derive(Clone, Debug)]
enum SpecDefault {
    Literal(Primitive),
    Absent(Absence),
    Lazy(LazyDefault),
}

impl SlotSpec {
    fn of(kind: SlotKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    /// A string slot. Defaults to `""`.
    pub fn string() -> Self {
        Self::of(SlotKind::Primitive(PrimitiveType::String))
    }

    /// A number slot. Defaults to `0`.
    pub fn number() -> Self {
        Self::of(SlotKind::Primitive(PrimitiveType::Number))
    }

    /// A boolean slot. Defaults to `false`.
    pub fn boolean() -> Self {
        Self::of(SlotKind::Primitive(PrimitiveType::Boolean))
    }

    /// A slot holding a tracked instance. Defaults to unset.
    pub fn nested() -> Self {
        Self::of(SlotKind::Nested)
    }

    /// A slot holding any value. Defaults to unset.
    pub fn opaque() -> Self {
        Self::of(SlotKind::Opaque)
    }

    /// An ordered sequence of opaque elements. Starts empty.
    pub fn list() -> Self {
        Self::of(SlotKind::List)
    }

    /// The slot's kind.
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Replace the type-derived default with a literal.
    ///
    /// Literal defaults are stored at allocation time and are not writes.
    pub fn default(mut self, value: impl Into<Primitive>) -> Self {
        self.default = Some(SpecDefault::Literal(value.into()));
        self
    }

    /// Default to [`Absence::Unset`].
    pub fn optional(mut self) -> Self {
        self.default = Some(SpecDefault::Absent(Absence::Unset));
        self
    }

    /// Default to [`Absence::Cleared`].
    pub fn nullable(mut self) -> Self {
        self.default = Some(SpecDefault::Absent(Absence::Cleared));
        self
    }

    /// Construct an instance of `schema` the first time the slot is read
    /// while unset.
    pub fn lazy(mut self, schema: &Schema) -> Self {
        self.default = Some(SpecDefault::Lazy(LazyDefault::Schema(schema.clone())));
        self
    }

    /// Like [`lazy`](Self::lazy), with the schema being built.
    ///
    /// Derived schemas keep constructing the base type for inherited slots.
    pub fn lazy_self(mut self) -> Self {
        self.default = Some(SpecDefault::Lazy(LazyDefault::This));
        self
    }

    fn resolve(self, slot: &str) -> Result<SlotDefault, SchemaError> {
        let kind = self.kind;
        let mismatch = |option| SchemaError::KindMismatch {
            slot: slot.to_owned(),
            kind,
            option,
        };
        match (kind, self.default) {
            (SlotKind::Primitive(t), None) => Ok(SlotDefault::Primitive(t.default_value())),
            (SlotKind::Nested | SlotKind::Opaque, None) => Ok(SlotDefault::Absent(Absence::Unset)),
            (SlotKind::List, None) => Ok(SlotDefault::EmptyList),
            (SlotKind::Primitive(t), Some(SpecDefault::Literal(p))) => {
                if p.primitive_type() == t {
                    Ok(SlotDefault::Primitive(p))
                } else {
                    Err(SchemaError::DefaultTypeMismatch {
                        slot: slot.to_owned(),
                        expected: t,
                        found: p.primitive_type(),
                    })
                }
            }
            (_, Some(SpecDefault::Literal(_))) => Err(mismatch("a literal default")),
            (SlotKind::List, Some(SpecDefault::Absent(_))) => Err(mismatch("an absent default")),
            (_, Some(SpecDefault::Absent(a))) => Ok(SlotDefault::Absent(a)),
            (SlotKind::Nested, Some(SpecDefault::Lazy(l))) => Ok(SlotDefault::Lazy(l)),
            (_, Some(SpecDefault::Lazy(_))) => Err(mismatch("a lazy default")),
        }
    }
}

// ── SlotDef ────────────────────────────────────────────────────────

/// One entry of a built slot table.
#[derive(Clone, Debug)]
pub struct SlotDef {
    id: SlotId,
    name: String,
    kind: SlotKind,
    pub(crate) default: SlotDefault,
}

impl SlotDef {
    /// Position in the slot table.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage kind.
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// The value a fresh instance holds, before initializers run.
    ///
    /// Lazily constructed slots report `Unset`; list slots report `Unset`
    /// as their scalar stand-in.
    pub fn default_value(&self) -> Value {
        match &self.default {
            SlotDefault::Primitive(p) => Value::Primitive(p.clone()),
            SlotDefault::Absent(a) => Value::from(*a),
            SlotDefault::Lazy(_) | SlotDefault::EmptyList => Value::Unset,
        }
    }

    pub(crate) fn is_lazy(&self) -> bool {
        matches!(self.default, SlotDefault::Lazy(_))
    }
}

// ── Schema ─────────────────────────────────────────────────────────

struct SchemaInner {
    id: SchemaId,
    name: String,
    base: Option<Schema>,
    slots: Vec<SlotDef>,
    by_name: IndexMap<String, SlotId>,
    inits: Vec<(SlotId, Initializer)>,
}

/// An immutable slot table shared by every instance of one type.
///
/// Cheap to clone. Two handles are equal when they refer to the same
/// built table.
#[derive(Clone)]
pub struct Schema(Rc<SchemaInner>);

impl Schema {
    /// Start declaring a new type.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            base: None,
            slots: Vec::new(),
            inits: Vec::new(),
        }
    }

    /// Start declaring a type that inherits every slot of `self`.
    ///
    /// Inherited slots keep their IDs. Redeclaring one overrides its
    /// default and drops its inherited initializer; `init` replaces the
    /// initializer.
    pub fn extend(&self, name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            base: Some(self.clone()),
            slots: Vec::new(),
            inits: Vec::new(),
        }
    }

    /// Unique ID of this table.
    pub fn id(&self) -> SchemaId {
        self.0.id
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The schema this one extends.
    pub fn base(&self) -> Option<&Schema> {
        self.0.base.as_ref()
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_a(&self, other: &Schema) -> bool {
        let mut cur = Some(self);
        while let Some(s) = cur {
            if s == other {
                return true;
            }
            cur = s.base();
        }
        false
    }

    /// Every slot, in ID order.
    pub fn slots(&self) -> &[SlotDef] {
        &self.0.slots
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&SlotDef> {
        let id = self.0.by_name.get(name)?;
        self.0.slots.get(id.index())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.0.slots.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.0.slots.is_empty()
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<&SlotDef, AccessError> {
        self.slot(name).ok_or_else(|| AccessError::UnknownSlot {
            schema: self.name().to_owned(),
            slot: name.to_owned(),
        })
    }

    pub(crate) fn def(&self, id: SlotId) -> Option<&SlotDef> {
        self.0.slots.get(id.index())
    }

    /// Schema to build when slot `id` is read while unset.
    pub(crate) fn lazy_schema(&self, id: SlotId) -> Option<Schema> {
        match &self.def(id)?.default {
            SlotDefault::Lazy(LazyDefault::This) => Some(self.clone()),
            SlotDefault::Lazy(LazyDefault::Schema(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub(crate) fn initializers(&self) -> &[(SlotId, Initializer)] {
        &self.0.inits
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("slots", &self.0.slots.len())
            .finish()
    }
}

// ── SchemaBuilder ──────────────────────────────────────────────────

/// Collects slot declarations and initializers for one type.
///
/// Declaration errors are reported together by [`build`](Self::build).
#[must_use = "call build() to produce the Schema"]
pub struct SchemaBuilder {
    name: String,
    base: Option<Schema>,
    slots: Vec<(String, SlotSpec)>,
    inits: Vec<(String, Initializer)>,
}

impl SchemaBuilder {
    /// Declare a slot, or override an inherited one.
    pub fn slot(mut self, name: impl Into<String>, spec: SlotSpec) -> Self {
        self.slots.push((name.into(), spec));
        self
    }

    /// Attach an initializer to a scalar slot.
    ///
    /// The closure runs once per construction, after defaults are stored,
    /// and its result is written through the regular write path. An
    /// instance whose initializer changes a slot is MUTATING right after
    /// construction.
    pub fn init<F, V>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&InitContext) -> Result<V, AccessError> + 'static,
        V: Into<Value>,
    {
        let init: ScalarInit = Rc::new(move |ctx| f(ctx).map(Into::into));
        self.inits.push((name.into(), Initializer::Scalar(init)));
        self
    }

    /// Attach an initializer to a list slot.
    ///
    /// Every construction gets its own freshly built sequence.
    pub fn init_list<F, I>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&InitContext) -> Result<I, AccessError> + 'static,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let init: ListInit =
            Rc::new(move |ctx| Ok(f(ctx)?.into_iter().map(Into::into).collect()));
        self.inits.push((name.into(), Initializer::List(init)));
        self
    }

    /// Validate the declarations and produce the slot table.
    pub fn build(self) -> Result<Schema, SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let (mut slots, mut inits) = match &self.base {
            Some(base) => (inherit_slots(base), base.0.inits.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let mut by_name: IndexMap<String, SlotId> =
            slots.iter().map(|s| (s.name.clone(), s.id)).collect();

        let mut declared = IndexSet::new();
        for (name, spec) in self.slots {
            if !declared.insert(name.clone()) {
                return Err(SchemaError::DuplicateSlot {
                    schema: self.name,
                    slot: name,
                });
            }
            let kind = spec.kind;
            let default = spec.resolve(&name)?;
            match by_name.get(&name) {
                Some(&id) => {
                    let inherited = &mut slots[id.index()];
                    if inherited.kind != kind {
                        return Err(SchemaError::OverrideKind {
                            slot: name,
                            inherited: inherited.kind,
                            declared: kind,
                        });
                    }
                    inherited.default = default;
                    inits.retain(|(sid, _)| *sid != id);
                }
                None => {
                    let id = SlotId(slots.len() as u32);
                    slots.push(SlotDef {
                        id,
                        name: name.clone(),
                        kind,
                        default,
                    });
                    by_name.insert(name, id);
                }
            }
        }

        for (name, init) in self.inits {
            let Some(&id) = by_name.get(&name) else {
                return Err(SchemaError::UnknownSlot {
                    schema: self.name,
                    slot: name,
                });
            };
            let kind = slots[id.index()].kind;
            let fits = matches!(
                (&init, kind),
                (Initializer::List(_), SlotKind::List)
            ) || (matches!(init, Initializer::Scalar(_)) && kind != SlotKind::List);
            if !fits {
                return Err(SchemaError::KindMismatch {
                    slot: name,
                    kind,
                    option: init.describe(),
                });
            }
            inits.retain(|(sid, _)| *sid != id);
            inits.push((id, init));
        }
        inits.sort_by_key(|(id, _)| *id);

        Ok(Schema(Rc::new(SchemaInner {
            id: SchemaId::next(),
            name: self.name,
            base: self.base,
            slots,
            by_name,
            inits,
        })))
    }
}

/// Copy the base table, pinning self-referencing lazy defaults to the base.
fn inherit_slots(base: &Schema) -> Vec<SlotDef> {
    base.slots()
        .iter()
        .map(|s| {
            let mut s = s.clone();
            if let SlotDefault::Lazy(LazyDefault::This) = s.default {
                s.default = SlotDefault::Lazy(LazyDefault::Schema(base.clone()));
            }
            s
        })
        .collect()
}

// ── InitContext ────────────────────────────────────────────────────

/// Handed to initializers during construction.
pub struct InitContext {
    object: Object,
}

impl InitContext {
    pub(crate) fn new(object: Object) -> Self {
        Self { object }
    }

    /// The instance being constructed. Its defaults are already stored.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// The store the instance belongs to.
    pub fn store(&self) -> Store {
        self.object.store()
    }

    /// Construct another instance in the same store.
    pub fn construct(&self, schema: &Schema) -> Result<Object, AccessError> {
        self.store().construct(schema)
    }
}
