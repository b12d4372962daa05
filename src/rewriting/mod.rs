//! Rewriting expressions.
//!
//! Expressions are rewritten inside an [`ExprGraph`](graph::ExprGraph) by
//! strategies: rules matching templates, combinators arranging other
//! strategies, and the phased [`Normalizer`](normalize::Normalizer).

pub mod enum_rule;
pub mod executor;
pub mod graph;
pub mod matching;
pub mod normalize;
pub mod rule;
pub mod strategy;
