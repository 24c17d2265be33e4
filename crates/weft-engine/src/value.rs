//! Slot values.
//!
//! A slot holds a [`Value`]: a primitive, one of the two absence markers,
//! a tracked [`Object`], or an [`Opaque`] shared value the engine does not
//! look inside. Routing between tracked and opaque handling happens per
//! write, by checking whether the value is a tracked instance.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use weft_core::{Absence, Primitive};

use crate::object::Object;

/// A shared, untracked value.
///
/// Mutations inside an opaque value (through interior mutability) are
/// invisible to the engine. Two opaque values are identical only when they
/// share the same allocation.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    /// Wrap a value.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the inner value as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both handles share one allocation.
    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// The content of one scalar slot or one list element.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// A string, number or boolean.
    Primitive(Primitive),
    /// No value was ever assigned.
    #[default]
    Unset,
    /// Explicitly cleared.
    Cleared,
    /// A tracked instance. Holding one establishes a parent edge.
    Object(Object),
    /// Any other value.
    Opaque(Opaque),
}

impl Value {
    /// Wrap an arbitrary value.
    ///
    /// A tracked [`Object`] passed here is still routed as a tracked value,
    /// so writing it into a slot establishes a parent edge.
    pub fn opaque<T: Any>(value: T) -> Self {
        let any: Rc<dyn Any> = Rc::new(value);
        match any.downcast::<Object>() {
            Ok(obj) => Value::Object((*obj).clone()),
            Err(any) => match any.downcast::<Value>() {
                Ok(v) => (*v).clone(),
                Err(any) => Value::Opaque(Opaque(any)),
            },
        }
    }

    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Primitive(Primitive::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The numeric content, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Primitive(Primitive::Num(n)) => Some(*n),
            _ => None,
        }
    }

    /// The boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Primitive(Primitive::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The tracked instance, if this holds one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The tracked instance, consuming the value.
    pub fn into_object(self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The opaque value, if this holds one.
    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Whether this is `Unset`.
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Whether this is `Cleared`.
    pub fn is_cleared(&self) -> bool {
        matches!(self, Value::Cleared)
    }

    /// Whether this holds a tracked instance.
    pub fn is_data_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Short description used in type-mismatch errors.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Value::Primitive(Primitive::Str(_)) => "string",
            Value::Primitive(Primitive::Num(_)) => "number",
            Value::Primitive(Primitive::Bool(_)) => "boolean",
            Value::Unset => "unset",
            Value::Cleared => "cleared",
            Value::Object(_) => "tracked object",
            Value::Opaque(_) => "opaque value",
        }
    }
}

/// Identity comparison: by value for primitives and absence markers, by
/// reference for tracked and opaque values.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Unset, Value::Unset) | (Value::Cleared, Value::Cleared) => true,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Primitive> for Value {
    fn from(v: Primitive) -> Self {
        Value::Primitive(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Primitive(Primitive::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Primitive(Primitive::Str(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Primitive(Primitive::Num(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Primitive(Primitive::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Primitive(Primitive::Bool(v))
    }
}

impl From<Absence> for Value {
    fn from(v: Absence) -> Self {
        match v {
            Absence::Unset => Value::Unset,
            Absence::Cleared => Value::Cleared,
        }
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<&Object> for Value {
    fn from(v: &Object) -> Self {
        Value::Object(v.clone())
    }
}

/// `None` becomes `Cleared`, the explicit null.
impl From<Option<Object>> for Value {
    fn from(v: Option<Object>) -> Self {
        v.map_or(Value::Cleared, Value::Object)
    }
}

impl From<Opaque> for Value {
    fn from(v: Opaque) -> Self {
        Value::Opaque(v)
    }
}

/// Whether `value` is a tracked instance produced by a store.
///
/// Accepts a bare [`Object`], a [`Value`] holding one, or anything else
/// (which is never a data object).
pub fn is_data_object(value: &dyn Any) -> bool {
    if value.downcast_ref::<Object>().is_some() {
        return true;
    }
    value.downcast_ref::<Value>().is_some_and(Value::is_data_object)
}
