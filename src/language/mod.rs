//! The typed expression language: types, constructors and expressions.

pub mod constructor;
pub mod expression;
pub mod infer;
pub mod literal;
pub mod scope;
pub mod types;
pub mod wildcard;

pub use constructor::{Constructor, ConstructorBuilder, Invocation};
pub use expression::{Call, Expr, ExprKind};
pub use literal::Literal;
pub use types::{Binding, Type, TypeName, TypeVar};
pub use wildcard::Wildcard;
