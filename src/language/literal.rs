use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::types::Type;

/// A host value embedded in an expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Str(Arc<str>),
    /// A type used as a value, e.g. the element type passed to a constructor
    Type(Type),
    Opaque(Opaque),
}

impl Literal {
    /// The type a value of this literal gets when none is given explicitly.
    pub fn host_type(&self) -> Type {
        match self {
            Literal::Int(_) => Type::int(),
            Literal::UInt(_) => Type::uint(),
            Literal::Bool(_) => Type::bool(),
            Literal::Str(_) => Type::str(),
            Literal::Type(ty) => Type::meta(ty.clone()),
            Literal::Opaque(_) => Type::opaque("object"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::UInt(value) => write!(f, "{value}u"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Str(value) => write!(f, "{value:?}"),
            Literal::Type(ty) => write!(f, "{ty}"),
            Literal::Opaque(opaque) => write!(f, "{}", opaque.label),
        }
    }
}

/// An arbitrary host object, compared by identity.
#[derive(Clone)]
pub struct Opaque {
    label: Arc<str>,
    object: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new(label: &str, object: impl Any + Send + Sync) -> Self {
        Self {
            label: label.into(),
            object: Arc::new(object),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }
}

impl Eq for Opaque {}

impl Hash for Opaque {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.object) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.label)
    }
}
