//! Normalized parent sequence returned by parent queries.

/// The parents of a child, normalized by edge count.
///
/// Zero edges give [`Parents::None`], exactly one edge gives the sole
/// parent as [`Parents::One`], and two or more give the full ordered
/// sequence with duplicates preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parents<T> {
    /// The child is not held by any parent.
    None,
    /// The child is held by exactly one slot of one parent.
    One(T),
    /// The child is held by several slots, in establishment order.
    Many(Vec<T>),
}

impl<T> Parents<T> {
    /// Normalize a sequence of parents.
    pub fn from_vec(mut parents: Vec<T>) -> Self {
        match parents.len() {
            0 => Self::None,
            1 => match parents.pop() {
                Some(p) => Self::One(p),
                None => Self::None,
            },
            _ => Self::Many(parents),
        }
    }

    /// Number of edges the value stands for.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Many(v) => v.len(),
        }
    }

    /// Whether there are no parents.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Flatten into an ordered vector (empty for `None`).
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::None => Vec::new(),
            Self::One(p) => vec![p],
            Self::Many(v) => v,
        }
    }
}

impl<T> Default for Parents<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T> FromIterator<T> for Parents<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
