//! Slot kinds, primitive types and absence markers.

use std::fmt;

/// Declared type of a primitive slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// UTF-8 string. Defaults to the empty string.
    String,
    /// Floating-point number. Defaults to `0`.
    Number,
    /// Boolean. Defaults to `false`.
    Boolean,
}

impl PrimitiveType {
    /// The type-derived default value for a slot of this type.
    pub fn default_value(self) -> Primitive {
        match self {
            Self::String => Primitive::Str(String::new()),
            Self::Number => Primitive::Num(0.0),
            Self::Boolean => Primitive::Bool(false),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// A primitive slot value.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// A string value.
    Str(String),
    /// A numeric value.
    Num(f64),
    /// A boolean value.
    Bool(bool),
}

impl Primitive {
    /// The type this value belongs to.
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Str(_) => PrimitiveType::String,
            Self::Num(_) => PrimitiveType::Number,
            Self::Bool(_) => PrimitiveType::Boolean,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Primitive {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Primitive {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Self::Num(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Self::Num(f64::from(v))
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Marker for a slot that holds no value.
///
/// `Unset` means the slot was never given a value (or was declared
/// optional); `Cleared` is an explicit "no value" written by the
/// application or declared as a nullable default. The two are distinct:
/// writing `Cleared` over `Unset` is a real write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Absence {
    /// Never assigned.
    Unset,
    /// Explicitly cleared.
    Cleared,
}

/// Storage kind of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// A typed primitive value with a type-derived default.
    Primitive(PrimitiveType),
    /// A reference to another tracked instance (or any value routed as opaque).
    Nested,
    /// Any value. Tracked instances written here still get parent edges.
    Opaque,
    /// An ordered sequence of opaque elements, allocated per instance.
    List,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(t) => write!(f, "primitive({t})"),
            Self::Nested => write!(f, "nested"),
            Self::Opaque => write!(f, "opaque"),
            Self::List => write!(f, "list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_derived_defaults() {
        assert_eq!(PrimitiveType::String.default_value(), Primitive::Str(String::new()));
        assert_eq!(PrimitiveType::Number.default_value(), Primitive::Num(0.0));
        assert_eq!(PrimitiveType::Boolean.default_value(), Primitive::Bool(false));
    }

    #[test]
    fn primitive_type_round_trip() {
        for t in [PrimitiveType::String, PrimitiveType::Number, PrimitiveType::Boolean] {
            assert_eq!(t.default_value().primitive_type(), t);
        }
    }

    #[test]
    fn integer_literals_become_numbers() {
        assert_eq!(Primitive::from(42), Primitive::Num(42.0));
        assert_eq!(Primitive::from("v1"), Primitive::Str("v1".into()));
    }
}
