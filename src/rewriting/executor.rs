//! Running strategies to a fixpoint.

use tracing::{debug, info};

use super::graph::ExprGraph;
use super::strategy::{Strategy, StrategyRef, Trace};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::language::expression::Expr;

/// Rewrites expressions with a default strategy until it stops replacing.
#[derive(Clone)]
pub struct Executor {
    strategy: StrategyRef,
    config: EngineConfig,
}

impl Executor {
    pub fn new(strategy: StrategyRef) -> Self {
        Self {
            strategy,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, expr: &Expr) -> Result<Expr, EngineError> {
        run(expr, self.strategy.as_ref(), &mut (), &self.config)
    }

    pub fn execute_traced(&self, expr: &Expr, trace: &mut dyn Trace) -> Result<Expr, EngineError> {
        run(expr, self.strategy.as_ref(), trace, &self.config)
    }

    /// Like [`execute_traced`](Self::execute_traced) with another strategy.
    pub fn execute_with(
        &self,
        expr: &Expr,
        strategy: &dyn Strategy,
        trace: &mut dyn Trace,
    ) -> Result<Expr, EngineError> {
        run(expr, strategy, trace, &self.config)
    }
}

/// Runs `strategy` on `expr` with the default configuration.
pub fn execute(expr: &Expr, strategy: &dyn Strategy) -> Result<Expr, EngineError> {
    run(expr, strategy, &mut (), &EngineConfig::default())
}

/// Applies `strategy` at the root of a graph of `expr` until it does nothing.
///
/// # Errors
///
/// [`EngineError::RepeatExceeded`] if the strategy is still replacing after
/// the configured number of rounds, and any error the strategy raises.
fn run(
    expr: &Expr,
    strategy: &dyn Strategy,
    trace: &mut dyn Trace,
    config: &EngineConfig,
) -> Result<Expr, EngineError> {
    let mut graph = ExprGraph::from_expression(expr.clone()).with_validation(config.validate_graph);
    let max = config.max_repetitions;
    info!(strategy = %strategy.name(), nodes = graph.node_count(), "executing");

    for round in 0..max {
        let did = strategy.apply(&mut graph.root_ref(), trace)?;
        if did.did_nothing() || !trace.accepts_more() {
            debug!(rounds = round + 1, nodes = graph.node_count(), "fixpoint reached");
            return Ok(graph.root_expression().clone());
        }
    }
    Err(EngineError::RepeatExceeded {
        max,
        strategy: strategy.name(),
        expression: graph.root_expression().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::language::types::Type;
    use crate::rewriting::normalize::Normalizer;
    use crate::rewriting::rule::MatchRule;
    use crate::rewriting::strategy::{IntoStrategy, StepResult, fold, repeat};
    use crate::testing::{arith, lambda, lists};
    use crate::trace::TraceLog;

    #[test]
    fn rules_apply_below_the_root() {
        let a = arith();
        let sum = a.add.call(vec![a.int(1), a.add.call(vec![a.int(2), a.int(3)])]);
        let expr = a.wrapper.call(vec![sum]);
        let result = execute(&expr, fold(a.add_ints_rule()).as_ref()).unwrap();
        assert_eq!(result, a.wrapper.call(vec![a.int(6)]));
    }

    #[test]
    fn iterated_wildcards_splice() {
        let l = lists();
        let ints = |values: &[i64]| l.create.call(values.iter().copied().map(Expr::int).collect());
        let empty = l.create.with_owner(l.list.of(vec![Type::int()])).call(vec![]);
        let expr = l.concat.call(vec![ints(&[1]), l.concat.call(vec![ints(&[2, 3]), empty])]);
        let result = execute(&expr, fold(l.concat_rule()).as_ref()).unwrap();
        assert_eq!(result, ints(&[1, 2, 3]));
    }

    #[test]
    fn beta_reduction_respects_shadowing() {
        let f = lambda();
        let int = f.int_ty.ty();
        let x = f.variable("x", int.clone());
        let inner = f.abs_create(x.clone(), x.clone());
        let body = f.apply.call(vec![inner, x.clone()]);
        let expr = f.apply.call(vec![f.abs_create(x, body), f.int(7)]);

        let result = execute(&expr, repeat(fold(f.beta_rule()), 10).as_ref()).unwrap();
        assert_eq!(result, f.int(7));
    }

    #[test]
    fn beta_keeps_inner_binders() {
        let f = lambda();
        let x = f.variable("x", f.int_ty.ty());
        let shadowing = f.abs_create(x.clone(), x.clone());
        let expr = f.apply.call(vec![f.abs_create(x, shadowing.clone()), f.int(1)]);
        assert_eq!(execute(&expr, &f.beta_rule()).unwrap(), shadowing);
    }

    #[test]
    fn non_terminating_strategy_is_reported() {
        let a = arith();
        let executor = Executor::new(fold(a.grow_rule()))
            .with_config(EngineConfig::default().with_max_repetitions(5));
        let error = executor.execute(&a.int(1)).unwrap_err();
        assert!(matches!(error, EngineError::RepeatExceeded { max: 5, .. }));
    }

    #[test]
    fn rule_rewriting_to_itself_exceeds_the_budget() {
        let a = arith();
        let neg = a.neg.clone();
        let int = a.int_ty.ty();
        let same = MatchRule::new("same", move |rb| {
            let x = rb.wildcard("x", int);
            rb.branch(neg.call(vec![x.expr()]), neg.call(vec![x.expr()]));
        })
        .unwrap();
        let executor = Executor::new(same.into_strategy())
            .with_config(EngineConfig::default().with_max_repetitions(4));
        let error = executor.execute(&a.neg.call(vec![a.int(1)])).unwrap_err();
        assert!(matches!(error, EngineError::RepeatExceeded { max: 4, .. }));
    }

    #[test]
    fn executing_twice_changes_nothing() {
        let a = arith();
        let mut normalizer = Normalizer::new();
        let mut registrator = normalizer.registrator();
        registrator.phase("core", a.add_ints_rule().into_strategy());
        registrator.phase("core", a.add_zero_rule().into_strategy());
        let executor = Executor::new(Arc::new(normalizer));

        let expr = a.add.call(vec![a.symbol("s"), a.add.call(vec![a.int(-2), a.int(2)])]);
        let once = executor.execute(&expr).unwrap();
        assert_eq!(once, a.symbol("s"));

        let mut results: Vec<StepResult> = Vec::new();
        assert_eq!(executor.execute_traced(&once, &mut results).unwrap(), once);
        assert!(results.is_empty());
    }

    #[test]
    fn trace_sees_every_intermediate_expression() {
        let a = arith();
        let expr = a.add.call(vec![a.add.call(vec![a.int(1), a.int(2)]), a.int(3)]);
        let mut log = TraceLog::default();
        let result = Executor::new(fold(a.add_ints_rule()))
            .execute_traced(&expr, &mut log)
            .unwrap();
        assert_eq!(result, a.int(6));
        let expressions: Vec<&str> = log.steps().iter().map(|step| step.expression.as_str()).collect();
        assert_eq!(
            expressions,
            ["add(Int.from_int(3), Int.from_int(3))", "Int.from_int(6)"]
        );
    }
}
