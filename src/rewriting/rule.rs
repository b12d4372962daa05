//! Rewrite rules.
//!
//! A [`MatchRule`] is a list of branches, each a template plus a replacement.
//! The first branch whose template matches the expression at the reference
//! and whose replacement does not decline wins. A [`DefaultRule`] expands a
//! constructor call through the constructor's body.

use std::fmt::Write;
use std::sync::Arc;

use tracing::debug;
use trait_set::trait_set;

use super::graph::Reference;
use super::matching::{Match, instantiate, match_expression};
use super::strategy::{Strategy, StepResult, Trace};
use crate::did::Did;
use crate::error::{EngineError, NoMatch};
use crate::language::constructor::{Constructor, Invocation};
use crate::language::expression::Expr;
use crate::language::infer::infer_call;
use crate::language::scope::{self, ScopeGuard};
use crate::language::types::{Type, TypeVar};
use crate::language::wildcard::Wildcard;

trait_set! {
    pub trait ThunkFn = Fn(&Match) -> Result<Expr, NoMatch> + Send + Sync + 'static;
}

/// What a matched template is rewritten to.
#[derive(Clone)]
pub enum Replacement {
    /// A template, instantiated with the match
    Expr(Expr),
    /// Computed from the match; may decline with [`NoMatch`]
    Thunk(Arc<dyn ThunkFn>),
}

impl Replacement {
    pub fn thunk(thunk: impl ThunkFn) -> Self {
        Replacement::Thunk(Arc::new(thunk))
    }
}

impl From<Expr> for Replacement {
    fn from(expr: Expr) -> Self {
        Replacement::Expr(expr)
    }
}

#[derive(Clone)]
struct Branch {
    template: Expr,
    replacement: Replacement,
}

/// Collects the wildcards and branches of a [`MatchRule`].
///
/// While the builder is alive, the type variables of its wildcards (and the
/// ones added with [`type_vars`](Self::type_vars)) are in scope, so templates
/// mentioning them type-check.
pub struct RuleBuilder {
    wildcards: Vec<Wildcard>,
    branches: Vec<Branch>,
    scope: ScopeGuard,
}

impl RuleBuilder {
    pub fn wildcard(&mut self, name: &str, ty: Type) -> Wildcard {
        self.add(Wildcard::new(name, ty))
    }

    /// A wildcard standing for a run of positional arguments of type `element`.
    pub fn iterated(&mut self, name: &str, element: Type) -> Wildcard {
        self.add(Wildcard::iterated(name, element))
    }

    fn add(&mut self, wildcard: Wildcard) -> Wildcard {
        self.scope.extend(wildcard.ty().free_vars());
        self.wildcards.push(wildcard.clone());
        wildcard
    }

    pub fn type_vars(&mut self, vars: &[TypeVar]) {
        self.scope.extend(vars.iter().cloned());
    }

    pub fn branch(&mut self, template: Expr, replacement: impl Into<Replacement>) {
        self.branches.push(Branch {
            template,
            replacement: replacement.into(),
        });
    }
}

/// A rule rewriting an expression that matches one of its templates.
///
/// ```
/// # use reductio::language::{Constructor, Type, TypeName};
/// # use reductio::rewriting::rule::MatchRule;
/// let int = TypeName::new("Int", 0).ty();
/// let neg = Constructor::builder("neg").param("x", int.clone()).ret(int.clone()).build();
/// let rule = MatchRule::new("neg_neg", |rb| {
///     let x = rb.wildcard("x", int);
///     rb.branch(neg.call(vec![neg.call(vec![x.expr()])]), x.expr());
/// })
/// .unwrap();
/// ```
#[derive(Clone)]
pub struct MatchRule {
    name: String,
    wildcards: Vec<Wildcard>,
    branches: Vec<Branch>,
}

impl MatchRule {
    /// Builds a rule, checking that its templates are well formed.
    pub fn new(name: impl Into<String>, define: impl FnOnce(&mut RuleBuilder)) -> Result<Self, EngineError> {
        let name = name.into();
        let mut builder = RuleBuilder {
            wildcards: Vec::new(),
            branches: Vec::new(),
            scope: scope::enter([]),
        };
        define(&mut builder);
        let RuleBuilder {
            wildcards,
            branches,
            scope,
        } = builder;
        drop(scope);

        if branches.is_empty() {
            return Err(EngineError::ill_formed(&name, "no branches"));
        }
        for branch in &branches {
            check_template(&name, &branch.template)?;
            if let Replacement::Expr(replacement) = &branch.replacement {
                let bound = branch.template.wildcards();
                if let Some(unbound) = replacement
                    .wildcards()
                    .into_iter()
                    .find(|wildcard| !bound.contains(wildcard))
                {
                    return Err(EngineError::ill_formed(
                        &name,
                        format!("{unbound} is not bound by the template {}", branch.template),
                    ));
                }
            }
        }

        Ok(Self {
            name,
            wildcards,
            branches,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wildcards(&self) -> &[Wildcard] {
        &self.wildcards
    }

    pub fn templates(&self) -> impl Iterator<Item = &Expr> {
        self.branches.iter().map(|branch| &branch.template)
    }

    fn result_name(&self, index: usize) -> String {
        if self.branches.len() == 1 {
            self.name.clone()
        } else {
            format!("{}[{index}]", self.name)
        }
    }

    /// Computes the replacement of one branch, or `None` if it declines.
    fn fire(&self, branch: &Branch, matched: &Match, logs: &mut Logs) -> Result<Option<Expr>, EngineError> {
        let guard = scope::enter(matched.types().vars().cloned());
        let result = match &branch.replacement {
            Replacement::Expr(template) => instantiate(template, matched),
            Replacement::Thunk(thunk) => {
                if matched.has_typed_placeholder() {
                    logs.note(|| "declined: a typed wildcard is bound to a placeholder".to_owned());
                    return Ok(None);
                }
                match thunk(matched) {
                    Ok(expr) => expr.substitute_types(matched.types()),
                    Err(declined) => {
                        logs.note(|| declined.to_string());
                        return Ok(None);
                    }
                }
            }
        };
        drop(guard);
        check_escapes(&self.name, &result)?;
        Ok(Some(result))
    }
}

impl Strategy for MatchRule {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        let subject = reference.expression().clone();
        let mut logs = Logs::new(trace.wants_logs());
        for (index, branch) in self.branches.iter().enumerate() {
            let matched = match match_expression(&branch.template, &subject) {
                Ok(matched) => matched,
                Err(no_match) => {
                    logs.note(|| format!("branch {index}: {no_match}"));
                    continue;
                }
            };
            let Some(result) = self.fire(branch, &matched, &mut logs)? else {
                continue;
            };
            logs.note(|| format!("{subject} -> {result}"));
            debug!(rule = %self.name, branch = index, from = %subject, to = %result, "rule fired");
            reference.replace(result)?;
            trace.record(
                StepResult::rule(self.result_name(index), logs.finish()),
                reference.graph(),
            );
            return Ok(Did::Something);
        }
        Ok(Did::Nothing)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Rewrites calls of a constructor with a body by evaluating the body.
///
/// Calls with a placeholder argument are left alone.
#[derive(Clone)]
pub struct DefaultRule {
    constructor: Constructor,
}

impl DefaultRule {
    pub fn new(constructor: &Constructor) -> Result<Self, EngineError> {
        if !constructor.has_body() {
            return Err(EngineError::ill_formed(
                constructor.name(),
                "constructor has no body",
            ));
        }
        Ok(Self {
            constructor: constructor.clone(),
        })
    }
}

impl Strategy for DefaultRule {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        let subject = reference.expression().clone();
        let Some(call) = subject.as_call() else {
            return Ok(Did::Nothing);
        };
        if !call.constructor().same_definition(&self.constructor)
            || call.children().any(Expr::is_placeholder)
        {
            return Ok(Did::Nothing);
        }
        let Ok(inferred) = infer_call(call) else {
            return Ok(Did::Nothing);
        };

        let guard = scope::enter(inferred.binding.vars().cloned());
        let Some(body) = call.constructor().invoke_body(&Invocation::new(call)) else {
            return Ok(Did::Nothing);
        };
        let result = body.substitute_types(&inferred.binding);
        drop(guard);
        check_escapes(self.constructor.name(), &result)?;

        debug!(constructor = %self.constructor.name(), from = %subject, to = %result, "body expanded");
        let mut logs = Logs::new(trace.wants_logs());
        logs.note(|| format!("{subject} -> {result}"));
        reference.replace(result)?;
        trace.record(
            StepResult::rule(self.constructor.name(), logs.finish()),
            reference.graph(),
        );
        Ok(Did::Something)
    }

    fn name(&self) -> String {
        self.constructor.name().to_owned()
    }
}

fn check_template(rule: &str, template: &Expr) -> Result<(), EngineError> {
    if template.is_iterated() {
        return Err(EngineError::ill_formed(rule, "template is an iterated wildcard"));
    }
    for expr in template.subterms() {
        if expr.is_ill_typed() {
            return Err(EngineError::ill_formed(
                rule,
                format!("template contains the ill-typed call {expr}"),
            ));
        }
        let Some(call) = expr.as_call() else {
            continue;
        };
        if call.args().iter().filter(|arg| arg.is_iterated()).count() > 1 {
            return Err(EngineError::ill_formed(
                rule,
                format!("more than one iterated wildcard in {expr}"),
            ));
        }
        if call.kwargs().iter().any(|(_, value)| value.is_iterated()) {
            return Err(EngineError::ill_formed(
                rule,
                format!("iterated wildcard as a keyword argument in {expr}"),
            ));
        }
    }
    Ok(())
}

fn check_escapes(context: &str, result: &Expr) -> Result<(), EngineError> {
    match result.free_type_vars().into_iter().find(|var| !scope::is_bound(var)) {
        Some(var) => Err(EngineError::UnresolvedTypeVariable {
            var: var.to_string(),
            context: format!("result of `{context}`: {result}"),
        }),
        None => Ok(()),
    }
}

/// Log lines of one rule application, collected only when the trace wants them.
struct Logs {
    enabled: bool,
    text: String,
}

impl Logs {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            text: String::new(),
        }
    }

    fn note(&mut self, line: impl FnOnce() -> String) {
        if self.enabled {
            let _ = writeln!(self.text, "{}", line());
        }
    }

    fn finish(self) -> String {
        self.text
    }
}
