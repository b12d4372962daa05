//! Return type inference for calls.
//!
//! Arguments are first bound to the constructor's parameters (arity and
//! keywords), then every argument type is matched against its declared
//! parameter type and the resulting bindings are merged. The declared return
//! type under the merged binding is the type of the call.

use std::sync::Arc;

use itertools::Itertools;

use super::constructor::Constructor;
use super::expression::{Call, Expr, Kwargs};
use super::literal::Literal;
use super::scope;
use super::types::{Binding, Type, TypeError, match_types, merge_bindings};
use crate::error::EngineError;

/// Outcome of inferring a call.
#[derive(Clone, Debug)]
pub struct Inferred {
    pub owner: Option<Type>,
    pub ret: Type,
    /// Binding of the constructor's own type variables
    pub binding: Binding,
}

/// Matches a declared parameter type against an argument.
///
/// A type value matches a meta parameter through the type it carries.
pub fn match_values(declared: &Type, actual: &Expr) -> Result<Binding, TypeError> {
    if let Type::Meta(inner) = declared
        && let Some(Literal::Type(ty)) = actual.as_literal()
    {
        return match_types(inner, ty);
    }
    match_types(declared, &actual.ty())
}

/// Checks positional arity and normalizes keyword arguments.
///
/// Keyword arguments come back in declaration order with defaults filled in.
pub fn bind_arguments(
    constructor: &Constructor,
    args: Vec<Expr>,
    kwargs: Kwargs,
) -> Result<(Vec<Expr>, Kwargs), EngineError> {
    let signature = constructor.signature();
    let arity = |reason: String| EngineError::Arity {
        constructor: constructor.name().to_owned(),
        reason,
    };

    for (index, arg) in args.iter().enumerate() {
        if let Some(param) = signature.params.get(index) {
            if arg.is_iterated() {
                return Err(arity(format!(
                    "iterated argument in place of parameter `{}`",
                    param.name
                )));
            }
        } else if signature.variadic.is_none() {
            return Err(arity(format!(
                "expected {} positional arguments, got {}",
                signature.params.len(),
                args.len()
            )));
        }
    }
    if args.len() < signature.params.len() {
        return Err(arity(format!(
            "expected {} positional arguments, got {}",
            signature.params.len(),
            args.len()
        )));
    }

    if let Some(name) = kwargs
        .iter()
        .map(|(name, _)| name)
        .find(|name| !signature.keywords.iter().any(|param| param.name == **name))
    {
        return Err(arity(format!("unexpected keyword `{name}`")));
    }
    if let Some(name) = kwargs.iter().map(|(name, _)| name).duplicates().next() {
        return Err(arity(format!("keyword `{name}` given twice")));
    }

    let mut given = kwargs;
    let mut bound = Vec::with_capacity(signature.keywords.len());
    for param in &signature.keywords {
        let value = match given.iter().position(|(name, _)| *name == param.name) {
            Some(position) => given.swap_remove(position).1,
            None => param
                .default
                .clone()
                .ok_or_else(|| arity(format!("missing keyword `{}`", param.name)))?,
        };
        bound.push((Arc::clone(&param.name), value));
    }
    Ok((args, bound))
}

/// Infers the owner and return type of a call with already bound arguments.
///
/// # Returns
///
/// The inferred types, or [`EngineError::IllTyped`] when an argument does not
/// fit, or [`EngineError::UnresolvedTypeVariable`] when the return type keeps
/// a variable that no open scope binds.
pub fn infer_types(
    constructor: &Constructor,
    args: &[Expr],
    kwargs: &Kwargs,
) -> Result<Inferred, EngineError> {
    let signature = constructor.signature();
    let ill_typed = |source| EngineError::IllTyped {
        constructor: constructor.name().to_owned(),
        source,
    };

    let mut bindings = Vec::new();
    if let (Some(declared), Some(given)) = (constructor.declared_owner(), constructor.owner()) {
        bindings.push(match_types(declared, given).map_err(ill_typed)?);
    }
    for (index, arg) in args.iter().enumerate() {
        let Some(param) = signature.params.get(index).or(signature.variadic.as_ref()) else {
            continue;
        };
        bindings.push(match_values(&param.ty, arg).map_err(ill_typed)?);
    }
    for (name, value) in kwargs {
        if let Some(param) = signature.keywords.iter().find(|param| param.name == *name) {
            bindings.push(match_values(&param.ty, value).map_err(ill_typed)?);
        }
    }
    let binding = merge_bindings(&bindings).map_err(ill_typed)?;

    let owner = constructor
        .declared_owner()
        .map(|owner| owner.substitute(&binding));
    let ret = signature.ret.substitute(&binding);
    let mut leftover = ret.free_vars();
    if let Some(owner) = &owner {
        owner.collect_vars(&mut leftover);
    }
    if let Some(var) = leftover.into_iter().find(|var| !scope::is_bound(var)) {
        return Err(EngineError::UnresolvedTypeVariable {
            var: var.to_string(),
            context: format!("call to `{}`", constructor.name()),
        });
    }

    Ok(Inferred {
        owner,
        ret,
        binding,
    })
}

/// Re-infers an existing call, e.g. to bind the type variables of a constructor body.
pub fn infer_call(call: &Call) -> Result<Inferred, EngineError> {
    infer_types(call.constructor(), call.args(), call.kwargs())
}
