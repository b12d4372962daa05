//! Rules for enum-like types.
//!
//! An enum type has one argument-less classmethod per variant and a `match`
//! constructor taking the enum value plus one option per variant, all options
//! sharing the return type. Matching on a known variant picks its option.

use super::rule::MatchRule;
use crate::error::EngineError;
use crate::language::constructor::Constructor;

/// Builds the rule `matcher(variant(), o_1, ..., o_n) -> o_i` for every variant.
///
/// The first parameter of `matcher` is the enum value; every other parameter
/// is named after one of `variants` and has the matcher's return type.
pub fn enum_rule(matcher: &Constructor, variants: &[Constructor]) -> Result<MatchRule, EngineError> {
    let signature = matcher.signature();
    let ill_formed = |reason: String| EngineError::ill_formed(matcher.name(), reason);

    if matcher.is_classmethod() {
        return Err(ill_formed("match must not be a classmethod".to_owned()));
    }
    if signature.variadic.is_some() || !signature.keywords.is_empty() {
        return Err(ill_formed("match takes only positional options".to_owned()));
    }
    let Some((subject, options)) = signature.params.split_first() else {
        return Err(ill_formed("match needs the enum value as first parameter".to_owned()));
    };
    if let Some(option) = options.iter().find(|option| option.ty != signature.ret) {
        return Err(ill_formed(format!(
            "option `{}` must have the return type {}",
            option.name, signature.ret
        )));
    }

    let mut ordered = Vec::with_capacity(options.len());
    for option in options {
        let variant = variants
            .iter()
            .find(|variant| variant.name() == &*option.name)
            .ok_or_else(|| ill_formed(format!("no variant named `{}`", option.name)))?;
        let variant_signature = variant.signature();
        if !variant.is_classmethod()
            || !variant_signature.params.is_empty()
            || variant_signature.variadic.is_some()
            || !variant_signature.keywords.is_empty()
            || variant_signature.ret != subject.ty
        {
            return Err(ill_formed(format!(
                "variant `{}` must be an argument-less classmethod returning {}",
                variant.name(),
                subject.ty
            )));
        }
        ordered.push(variant.clone());
    }

    let option_type = signature.ret.clone();
    let names: Vec<String> = options.iter().map(|option| option.name.to_string()).collect();
    MatchRule::new(format!("{}.{}", subject.ty, matcher.name()), |rb| {
        let wildcards: Vec<_> = names
            .iter()
            .map(|name| rb.wildcard(name, option_type.clone()))
            .collect();
        for (variant, chosen) in ordered.iter().zip(&wildcards) {
            let args = std::iter::once(variant.call(vec![]))
                .chain(wildcards.iter().map(|wildcard| wildcard.expr()))
                .collect();
            rb.branch(matcher.call(args), chosen.expr());
        }
    })
}
