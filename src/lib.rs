//! A typed term-rewriting engine.
//!
//! Expressions are trees of typed constructor calls and literal values,
//! shared in a hash-consed graph while they are being rewritten. Rules match
//! templates containing wildcards, strategies decide where and how often
//! rules are tried, and the [`Normalizer`](rewriting::normalize::Normalizer)
//! runs registered strategies in named phases until nothing changes.

#[macro_use]
mod macros;

pub mod config;
pub mod did;
pub mod error;
pub mod language;
pub mod rewriting;
pub mod seen;
pub mod trace;
pub mod utils;

#[cfg(test)]
mod testing;
