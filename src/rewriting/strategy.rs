//! Strategies and strategy combinators.
//!
//! A [`Strategy`] is applied to a [`Reference`] into an expression graph. It
//! rewrites the graph in place and reports every replacement it performs to a
//! [`Trace`], in order. Combinators build larger strategies from smaller ones
//! without knowing anything about the rules inside them.

use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::graph::{ExprGraph, Reference};
use crate::did::Did;
use crate::error::EngineError;

/// One reported step of a rewrite.
///
/// Rules emit results with a `name`; [`Label`] emits results with a `label`
/// and no logs, marking that the labelled group replaced something.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub label: Option<String>,
    pub logs: String,
}

impl StepResult {
    pub fn rule(name: impl Into<String>, logs: String) -> Self {
        Self {
            name: name.into(),
            label: None,
            logs,
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            label: Some(label),
            logs: String::new(),
        }
    }

    pub fn is_label(&self) -> bool {
        self.label.is_some()
    }
}

/// Receives the results of a strategy, each together with the graph right after it.
pub trait Trace {
    fn record(&mut self, result: StepResult, graph: &ExprGraph);

    /// Whether the sink still wants results. Strategies stop early once it does not.
    fn accepts_more(&self) -> bool {
        true
    }

    /// Whether rules should spend time collecting their logs.
    fn wants_logs(&self) -> bool {
        true
    }
}

impl Trace for Vec<StepResult> {
    fn record(&mut self, result: StepResult, _graph: &ExprGraph) {
        self.push(result);
    }
}

/// Discards every result.
impl Trace for () {
    fn record(&mut self, _result: StepResult, _graph: &ExprGraph) {}

    fn wants_logs(&self) -> bool {
        false
    }
}

/// Passes on a single result, then closes.
struct FirstOnly<'t> {
    inner: &'t mut dyn Trace,
    recorded: bool,
}

impl Trace for FirstOnly<'_> {
    fn record(&mut self, result: StepResult, graph: &ExprGraph) {
        self.inner.record(result, graph);
        self.recorded = true;
    }

    fn accepts_more(&self) -> bool {
        !self.recorded && self.inner.accepts_more()
    }

    fn wants_logs(&self) -> bool {
        self.inner.wants_logs()
    }
}

pub trait Strategy: Send + Sync {
    /// Rewrites the expression at `reference`, reporting each replacement to `trace`.
    ///
    /// # Returns
    ///
    /// [`Did::Something`] if at least one replacement happened.
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError>;

    fn name(&self) -> String;
}

pub type StrategyRef = Arc<dyn Strategy>;

/// Anything usable where a shared strategy is expected.
pub trait IntoStrategy {
    fn into_strategy(self) -> StrategyRef;
}

impl<S: Strategy + 'static> IntoStrategy for S {
    fn into_strategy(self) -> StrategyRef {
        Arc::new(self)
    }
}

impl IntoStrategy for StrategyRef {
    fn into_strategy(self) -> StrategyRef {
        self
    }
}

fn names(strategies: &[StrategyRef]) -> String {
    strategies.iter().map(|strategy| strategy.name()).join(", ")
}

/// Applies every strategy in order, each to the same reference.
#[derive(Clone)]
pub struct Sequence(pub Vec<StrategyRef>);

impl Strategy for Sequence {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        let mut did = Did::Nothing;
        for strategy in &self.0 {
            if !trace.accepts_more() {
                break;
            }
            did |= strategy.apply(reference, trace)?;
        }
        Ok(did)
    }

    fn name(&self) -> String {
        format!("sequence({})", names(&self.0))
    }
}

/// Applies strategies in order until one of them replaces something,
/// keeping only that strategy's first result.
#[derive(Clone)]
pub struct FirstMatch(pub Vec<StrategyRef>);

impl Strategy for FirstMatch {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        for strategy in &self.0 {
            let mut first = FirstOnly {
                inner: &mut *trace,
                recorded: false,
            };
            if strategy.apply(reference, &mut first)?.did_something() {
                return Ok(Did::Something);
            }
        }
        Ok(Did::Nothing)
    }

    fn name(&self) -> String {
        format!("first_match({})", names(&self.0))
    }
}

/// Tries the inner strategy on every descendant in turn and stops at the first
/// one it rewrites.
///
/// From the root, leaves are tried before their parents; from anywhere else,
/// parents come first.
#[derive(Clone)]
pub struct Fold(pub StrategyRef);

impl Strategy for Fold {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        for node in reference.descendants() {
            let mut child = reference.at(node);
            if self.0.apply(&mut child, trace)?.did_something() {
                return Ok(Did::Something);
            }
        }
        Ok(Did::Nothing)
    }

    fn name(&self) -> String {
        format!("fold({})", self.0.name())
    }
}

/// Reapplies the inner strategy until it stops replacing.
///
/// Fails with [`EngineError::RepeatExceeded`] after `max` productive iterations.
#[derive(Clone)]
pub struct Repeat {
    pub strategy: StrategyRef,
    pub max: usize,
}

impl Strategy for Repeat {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        let mut did = Did::Nothing;
        for _ in 0..self.max {
            if self.strategy.apply(reference, trace)?.did_nothing() {
                return Ok(did);
            }
            did = Did::Something;
            if !trace.accepts_more() {
                return Ok(did);
            }
        }
        debug!(strategy = %self.strategy.name(), max = self.max, "repeat budget exhausted");
        Err(EngineError::RepeatExceeded {
            max: self.max,
            strategy: self.strategy.name(),
            expression: reference.expression().to_string(),
        })
    }

    fn name(&self) -> String {
        format!("repeat({})", self.strategy.name())
    }
}

/// Passes the inner strategy's results through and, if there were any,
/// appends a result carrying the label.
#[derive(Clone)]
pub struct Label {
    pub label: String,
    pub strategy: StrategyRef,
}

impl Strategy for Label {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        let did = self.strategy.apply(reference, trace)?;
        if did.did_something() && trace.accepts_more() {
            trace.record(StepResult::label(&self.label), reference.graph());
        }
        Ok(did)
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

pub fn sequence(strategies: Vec<StrategyRef>) -> StrategyRef {
    Arc::new(Sequence(strategies))
}

pub fn first_match(strategies: Vec<StrategyRef>) -> StrategyRef {
    Arc::new(FirstMatch(strategies))
}

pub fn fold(strategy: impl IntoStrategy) -> StrategyRef {
    Arc::new(Fold(strategy.into_strategy()))
}

pub fn repeat(strategy: impl IntoStrategy, max: usize) -> StrategyRef {
    Arc::new(Repeat {
        strategy: strategy.into_strategy(),
        max,
    })
}

pub fn label(label: &str, strategy: impl IntoStrategy) -> StrategyRef {
    Arc::new(Label {
        label: label.to_owned(),
        strategy: strategy.into_strategy(),
    })
}
