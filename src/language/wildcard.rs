use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::expression::Expr;
use super::types::Type;

static NEXT_WILDCARD: AtomicU64 = AtomicU64::new(0);

/// A pattern variable of a rule template.
///
/// An iterated wildcard stands for zero or more consecutive positional
/// arguments, each of the wildcard's element type.
#[derive(Clone, Debug)]
pub struct Wildcard {
    id: u64,
    name: Arc<str>,
    ty: Type,
    iterated: bool,
}

impl Wildcard {
    pub fn new(name: &str, ty: Type) -> Self {
        Self::create(name, ty, false)
    }

    pub fn iterated(name: &str, element: Type) -> Self {
        Self::create(name, element, true)
    }

    fn create(name: &str, ty: Type, iterated: bool) -> Self {
        Self {
            id: NEXT_WILDCARD.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            ty,
            iterated,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wildcard's type; the element type for iterated wildcards.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_iterated(&self) -> bool {
        self.iterated
    }

    pub fn expr(&self) -> Expr {
        Expr::wildcard(self.clone())
    }

    pub(crate) fn with_type(&self, ty: Type) -> Self {
        Self {
            ty,
            ..self.clone()
        }
    }
}

impl PartialEq for Wildcard {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Wildcard {}

impl Hash for Wildcard {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.iterated {
            write!(f, "*${}", self.name)
        } else {
            write!(f, "${}", self.name)
        }
    }
}
