//! Matching rule templates against expressions.
//!
//! A template is an expression that may contain wildcards. Matching walks the
//! template and the subject together, binding wildcards to subexpressions
//! and type variables to types. Partial matches are combined with a safe
//! merge: a wildcard or type variable bound twice must be bound to the same
//! thing both times.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use itertools::Itertools;
use tracing::trace;

use crate::error::NoMatch;
use crate::language::constructor::Constructor;
use crate::language::expression::{Call, Expr, ExprKind};
use crate::language::infer::match_values;
use crate::language::literal::Literal;
use crate::language::types::{Binding, match_types};
use crate::language::wildcard::Wildcard;

/// What a wildcard was bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    One(Expr),
    /// The run of arguments an iterated wildcard stands for
    Many(Vec<Expr>),
}

/// A successful match: wildcard bindings plus the type binding they imply.
#[derive(Clone, Debug, Default)]
pub struct Match {
    types: Binding,
    wildcards: HashMap<Wildcard, Bound>,
}

impl Match {
    fn with_types(types: Binding) -> Self {
        Self {
            types,
            wildcards: HashMap::new(),
        }
    }

    fn single(wildcard: &Wildcard, bound: Bound, types: Binding) -> Self {
        Self {
            types,
            wildcards: HashMap::from([(wildcard.clone(), bound)]),
        }
    }

    /// Tries to merge two matches, returning `None` if they conflict.
    pub fn try_merge(&self, other: &Self) -> Option<Self> {
        let mut merged = self.clone();
        merged.types = merged.types.try_merge(&other.types).ok()?;
        for (wildcard, bound) in &other.wildcards {
            match merged.wildcards.entry(wildcard.clone()) {
                Entry::Occupied(entry) if entry.get() != bound => return None,
                Entry::Occupied(_) => {}
                Entry::Vacant(entry) => {
                    entry.insert(bound.clone());
                }
            }
        }
        Some(merged)
    }

    pub fn types(&self) -> &Binding {
        &self.types
    }

    pub fn at(&self, wildcard: &Wildcard) -> Option<&Bound> {
        self.wildcards.get(wildcard)
    }

    pub fn wildcards(&self) -> impl Iterator<Item = (&Wildcard, &Bound)> {
        self.wildcards.iter()
    }

    pub fn len(&self) -> usize {
        self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wildcards.is_empty()
    }

    /// The expression bound to a plain wildcard.
    pub fn one(&self, wildcard: &Wildcard) -> Result<&Expr, NoMatch> {
        match self.at(wildcard) {
            Some(Bound::One(expr)) => Ok(expr),
            _ => Err(NoMatch::new(format!("{wildcard} is not bound to one expression"))),
        }
    }

    /// The run of expressions bound to an iterated wildcard.
    pub fn many(&self, wildcard: &Wildcard) -> Result<&[Expr], NoMatch> {
        match self.at(wildcard) {
            Some(Bound::Many(exprs)) => Ok(exprs),
            _ => Err(NoMatch::new(format!("{wildcard} is not bound to a sequence"))),
        }
    }

    /// The integer value bound to a wildcard; declines if it is not an integer literal.
    pub fn int(&self, wildcard: &Wildcard) -> Result<i64, NoMatch> {
        self.one(wildcard)?
            .as_int()
            .ok_or_else(|| NoMatch::new(format!("{wildcard} is not an integer literal")))
    }

    pub fn literal(&self, wildcard: &Wildcard) -> Result<&Literal, NoMatch> {
        self.one(wildcard)?
            .as_literal()
            .ok_or_else(|| NoMatch::new(format!("{wildcard} is not a literal")))
    }

    /// Whether a wildcard of a non-vague type was bound to a placeholder.
    pub fn has_typed_placeholder(&self) -> bool {
        self.wildcards.iter().any(|(wildcard, bound)| {
            !wildcard.ty().is_vague()
                && match bound {
                    Bound::One(expr) => expr.is_placeholder(),
                    Bound::Many(exprs) => exprs.iter().any(Expr::is_placeholder),
                }
        })
    }

    fn merge(self, other: Match) -> Result<Self, NoMatch> {
        self.try_merge(&other)
            .ok_or_else(|| NoMatch::new("conflicting bindings"))
    }
}

/// Matches `template` against `subject`.
///
/// # Returns
///
/// The bindings that make the instantiated template equal to `subject`,
/// or [`NoMatch`] if there are none.
pub fn match_expression(template: &Expr, subject: &Expr) -> Result<Match, NoMatch> {
    trace!(%template, %subject, "matching");
    if let Some(wildcard) = template.as_wildcard() {
        if wildcard.is_iterated() {
            return Err(NoMatch::new("iterated wildcard outside of an argument list"));
        }
        let types = match_wildcard(wildcard, subject)?;
        return Ok(Match::single(wildcard, Bound::One(subject.clone()), types));
    }
    match (template.kind(), subject.kind()) {
        (ExprKind::Call(template), ExprKind::Call(subject)) => match_call(template, subject),
        (ExprKind::Value(_), ExprKind::Value(_)) if template == subject => Ok(Match::default()),
        _ => Err(NoMatch::new(format!("{subject} does not fit {template}"))),
    }
}

fn match_wildcard(wildcard: &Wildcard, subject: &Expr) -> Result<Binding, NoMatch> {
    Ok(match_values(wildcard.ty(), subject)?)
}

fn match_constructors(template: &Constructor, subject: &Constructor) -> Result<Binding, NoMatch> {
    if !template.same_definition(subject) {
        return Err(NoMatch::new(format!(
            "`{}` is not `{}`",
            subject.name(),
            template.name()
        )));
    }
    match (template.owner(), subject.owner()) {
        (Some(template), Some(subject)) => Ok(match_types(template, subject)?),
        (None, None) => Ok(Binding::default()),
        _ => Err(NoMatch::new("owner types differ")),
    }
}

fn match_call(template: &Call, subject: &Call) -> Result<Match, NoMatch> {
    let mut result = Match::with_types(match_constructors(template.constructor(), subject.constructor())?);

    let iterated = template.args().iter().positions(Expr::is_iterated).collect_vec();
    match iterated.as_slice() {
        [] => {
            if template.args().len() != subject.args().len() {
                return Err(NoMatch::new("different number of arguments"));
            }
            for (arg, subject_arg) in template.args().iter().zip(subject.args()) {
                result = result.merge(match_expression(arg, subject_arg)?)?;
            }
        }
        [index] => {
            let right = template.args().len() - index - 1;
            if subject.args().len() < index + right {
                return Err(NoMatch::new("too few arguments for the iterated wildcard"));
            }
            let (prefix, middle, suffix) = collapse(subject.args(), *index, right);
            let template_prefix = &template.args()[..*index];
            let template_suffix = &template.args()[index + 1..];
            for (arg, subject_arg) in template_prefix
                .iter()
                .zip_eq(prefix)
                .chain(template_suffix.iter().zip_eq(suffix))
            {
                result = result.merge(match_expression(arg, subject_arg)?)?;
            }
            if let Some(wildcard) = template.args()[*index].as_wildcard() {
                result = result.merge(match_iterated(wildcard, middle)?)?;
            }
        }
        _ => return Err(NoMatch::new("more than one iterated wildcard")),
    }

    if template.kwargs().len() != subject.kwargs().len() {
        return Err(NoMatch::new("different keyword arguments"));
    }
    for (key, arg) in template.kwargs() {
        let subject_arg = subject
            .kwarg(key)
            .ok_or_else(|| NoMatch::new(format!("missing keyword `{key}`")))?;
        result = result.merge(match_expression(arg, subject_arg)?)?;
    }
    Ok(result)
}

fn match_iterated(wildcard: &Wildcard, items: &[Expr]) -> Result<Match, NoMatch> {
    let mut types = Binding::default();
    for item in items {
        let item_types = match_wildcard(wildcard, item)?;
        types = types.try_merge(&item_types)?;
    }
    Ok(Match::single(wildcard, Bound::Many(items.to_vec()), types))
}

/// Splits `items` into `left` leading items, the middle, and `right` trailing items.
///
/// # Panics
///
/// When `left + right` exceeds the number of items.
pub fn collapse<T>(items: &[T], left: usize, right: usize) -> (&[T], &[T], &[T]) {
    let (prefix, rest) = items.split_at(left);
    let (middle, suffix) = rest.split_at(rest.len() - right);
    (prefix, middle, suffix)
}

/// Builds the expression a template stands for under a match.
///
/// Iterated wildcards are spliced into the argument list they appear in,
/// and the match's type binding is applied to the result.
pub fn instantiate(template: &Expr, matched: &Match) -> Expr {
    splice(template, matched).substitute_types(matched.types())
}

fn splice(template: &Expr, matched: &Match) -> Expr {
    match template.kind() {
        ExprKind::Wildcard(wildcard) => match matched.at(wildcard) {
            Some(Bound::One(expr)) => expr.clone(),
            _ => template.clone(),
        },
        ExprKind::Call(call) => {
            let mut args = Vec::with_capacity(call.args().len());
            for arg in call.args() {
                match arg.as_wildcard().and_then(|wildcard| matched.at(wildcard)) {
                    Some(Bound::Many(items)) => args.extend(items.iter().cloned()),
                    _ => args.push(splice(arg, matched)),
                }
            }
            let kwargs = call
                .kwargs()
                .iter()
                .map(|(key, value)| (key.clone(), splice(value, matched)))
                .collect();
            Expr::from_call(Call::new(
                call.constructor().clone(),
                args,
                kwargs,
                call.ret().clone(),
            ))
        }
        ExprKind::Value(_) => template.clone(),
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::language::scope;
    use crate::language::types::{Type, TypeVar};
    use crate::testing::{arith, lists};

    #[test]
    fn collapse_splits_around_middle() {
        let items: Vec<i32> = (0..10).collect();
        let (left, middle, right) = collapse(&items, 3, 4);
        assert_eq!(left, [0, 1, 2]);
        assert_eq!(middle, [3, 4, 5]);
        assert_eq!(right, [6, 7, 8, 9]);
    }

    #[test]
    fn wildcard_binds_subterm() {
        let a = arith();
        let x = Wildcard::new("x", a.int_ty.ty());
        let template = a.add.call(vec![x.expr(), a.int(0)]);
        let subject = a.add.call(vec![a.symbol("s"), a.int(0)]);
        let matched = match_expression(&template, &subject).unwrap();
        assert_eq!(matched.one(&x).unwrap(), &a.symbol("s"));
        assert_eq!(instantiate(&template, &matched), subject);
    }

    #[test]
    fn repeated_wildcard_must_agree() {
        let a = arith();
        let x = Wildcard::new("x", a.int_ty.ty());
        let template = a.add.call(vec![x.expr(), x.expr()]);
        assert!(match_expression(&template, &a.add.call(vec![a.int(1), a.int(1)])).is_ok());
        assert!(match_expression(&template, &a.add.call(vec![a.int(1), a.int(2)])).is_err());
    }

    #[test]
    fn different_constructors_do_not_match() {
        let a = arith();
        let x = Wildcard::new("x", a.int_ty.ty());
        let template = a.neg.call(vec![x.expr()]);
        assert!(match_expression(&template, &a.wrapper.call(vec![a.int(1)])).is_err());
    }

    #[test]
    fn wildcard_type_must_fit() {
        let a = arith();
        let x = Wildcard::new("x", Type::str());
        assert!(match_expression(&x.expr(), &a.int(1)).is_err());
        assert!(match_expression(&x.expr(), &Expr::str("s")).is_ok());
    }

    #[test]
    fn placeholders_match_by_type() {
        let a = arith();
        let typed = Wildcard::new("x", a.int_ty.ty());
        let placeholder = Expr::placeholder(a.int_ty.ty());
        let matched = match_expression(&typed.expr(), &placeholder).unwrap();
        assert!(matched.has_typed_placeholder());

        let vague = Wildcard::new("y", Type::Any);
        let matched = match_expression(&vague.expr(), &placeholder).unwrap();
        assert!(!matched.has_typed_placeholder());

        assert!(match_expression(&typed.expr(), &Expr::placeholder(Type::str())).is_err());
    }

    #[test]
    fn ill_typed_subjects_only_match_any_wildcards() {
        let a = arith();
        let ill_typed = a.neg.call(vec![Expr::str("s")]);
        assert!(match_expression(&Wildcard::new("x", a.int_ty.ty()).expr(), &ill_typed).is_err());
        let t = TypeVar::fresh("T");
        assert!(match_expression(&Wildcard::new("t", Type::var(&t)).expr(), &ill_typed).is_err());
        assert!(match_expression(&Wildcard::new("y", Type::Any).expr(), &ill_typed).is_ok());
    }

    #[test]
    fn iterated_wildcard_binds_the_middle() {
        let l = lists();
        let _scope = scope::enter([l.t.clone()]);
        let first = Wildcard::new("first", Type::var(&l.t));
        let rest = Wildcard::iterated("rest", Type::var(&l.t));
        let template = l.create.call(vec![first.expr(), rest.expr()]);
        let subject = l.create.call(vec![Expr::int(1), Expr::int(2), Expr::int(3)]);

        let matched = match_expression(&template, &subject).unwrap();
        assert_eq!(matched.one(&first).unwrap(), &Expr::int(1));
        assert_eq!(matched.many(&rest).unwrap(), [Expr::int(2), Expr::int(3)]);
        assert_eq!(matched.types().get(&l.t), Some(&Type::int()));
        assert_eq!(instantiate(&template, &matched), subject);

        let single = l.create.call(vec![Expr::int(1)]);
        let matched = match_expression(&template, &single).unwrap();
        assert!(matched.many(&rest).unwrap().is_empty());

        let empty = l.create.with_owner(l.list.of(vec![Type::int()])).call(vec![]);
        assert!(match_expression(&template, &empty).is_err());
    }

    #[test]
    fn two_iterated_wildcards_are_rejected() {
        let l = lists();
        let _scope = scope::enter([l.t.clone()]);
        let xs = Wildcard::iterated("xs", Type::var(&l.t));
        let ys = Wildcard::iterated("ys", Type::var(&l.t));
        let template = l.create.call(vec![xs.expr(), ys.expr()]);
        let subject = l.create.call(vec![Expr::int(1)]);
        assert!(match_expression(&template, &subject).is_err());
    }

    #[test]
    fn owner_types_are_matched() {
        let l = lists();
        let _scope = scope::enter([l.t.clone()]);
        let xs = Wildcard::iterated("xs", Type::var(&l.t));
        let template = l.create.call(vec![xs.expr()]);
        let ints = l.create.call(vec![Expr::int(1)]);
        let strs = l.create.call(vec![Expr::str("a")]);
        assert_eq!(
            match_expression(&template, &ints).unwrap().types().get(&l.t),
            Some(&Type::int())
        );
        assert_eq!(
            match_expression(&template, &strs).unwrap().types().get(&l.t),
            Some(&Type::str())
        );
    }

    #[test]
    fn keyword_arguments_match_by_name() {
        let a = arith();
        let scaled = crate::language::constructor::Constructor::builder("scaled")
            .param("value", a.int_ty.ty())
            .keyword_default("factor", Type::int(), Expr::int(1))
            .ret(a.int_ty.ty())
            .build();
        let factor = Wildcard::new("factor", Type::int());
        let template = scaled.call_kw(vec![a.int(1)], vec![("factor", factor.expr())]);
        let subject = scaled.call_kw(vec![a.int(1)], vec![("factor", Expr::int(4))]);
        assert_eq!(match_expression(&template, &subject).unwrap().int(&factor), Ok(4));
    }

    #[test]
    fn instantiated_match_reproduces_subject() {
        let a = arith();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let x = Wildcard::new("x", a.int_ty.ty());
            let y = Wildcard::new("y", a.int_ty.ty());
            let mut subject = a.int(rng.gen_range(0..3));
            for _ in 0..rng.gen_range(1..5) {
                subject = a.add.call(vec![subject, a.int(rng.gen_range(0..3))]);
            }
            let template = a.add.call(vec![x.expr(), y.expr()]);
            let matched = match_expression(&template, &subject).unwrap();
            assert_eq!(instantiate(&template, &matched), subject);
        }
    }
}
