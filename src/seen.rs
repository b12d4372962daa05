//! Distinguishing freshly interned graph nodes from existing ones.

/// Result of interning a value: either it was just inserted or it already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seen<T> {
    /// The value was inserted by this call
    New(T),
    /// An equal value was already present
    Old(T),
}

impl<T> Seen<T> {
    /// Extracts the inner value regardless of whether it's new or old.
    pub fn any(self) -> T {
        match self {
            Seen::New(x) => x,
            Seen::Old(x) => x,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Seen::New(_))
    }
}
