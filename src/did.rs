//! Whether a strategy application changed anything.
//!
//! Every [`Strategy`](crate::rewriting::strategy::Strategy) reports a [`Did`]
//! instead of a bare `bool`, so combinators read as what they mean.

use std::ops::{BitOr, BitOrAssign};

/// Outcome of applying a strategy to a reference.
///
/// # Examples
///
/// ```
/// # use reductio::did::Did;
/// let mut did = Did::Nothing;
/// did |= Did::from(true);
/// assert!(did.did_something());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Did {
    /// At least one rewrite happened
    Something,
    /// The expression was left untouched
    Nothing,
}

impl Did {
    pub fn did_something(&self) -> bool {
        matches!(self, Did::Something)
    }

    pub fn did_nothing(&self) -> bool {
        !self.did_something()
    }
}

impl From<bool> for Did {
    fn from(value: bool) -> Self {
        if value { Did::Something } else { Did::Nothing }
    }
}

impl BitOr for Did {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self::Output {
        self |= rhs;
        self
    }
}

impl BitOrAssign for Did {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = match (&self, rhs) {
            (Did::Nothing, Did::Nothing) => Did::Nothing,
            _ => Did::Something,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_keeps_something() {
        assert_eq!(Did::Nothing | Did::Nothing, Did::Nothing);
        assert_eq!(Did::Nothing | Did::Something, Did::Something);
        assert_eq!(Did::Something | Did::Nothing, Did::Something);
    }
}
