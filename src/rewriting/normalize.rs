//! Phased normalization.
//!
//! A [`Normalizer`] groups strategies into `pre`, ordered named phases, and
//! `post`. Each phase may also use the strategies of every phase before it,
//! and a phase is labelled in the trace whenever it replaces something, so a
//! consumer can tell when each phase ran. The whole pipeline repeats until
//! nothing changes anymore.

use std::sync::Arc;

use super::graph::Reference;
use super::strategy::{Strategy, StrategyRef, Trace, first_match, fold, label, repeat, sequence};
use crate::config::{DEFAULT_MAX_REPETITIONS, EngineConfig};
use crate::did::Did;
use crate::error::EngineError;

const TEMPORARY_PHASE: &str = "__tmp";

#[derive(Clone)]
pub struct Normalizer {
    pre: Vec<StrategyRef>,
    phases: Vec<(String, Vec<StrategyRef>)>,
    post: Vec<StrategyRef>,
    max_repetitions: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            phases: Vec::new(),
            post: Vec::new(),
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

fn add_unique(strategies: &mut Vec<StrategyRef>, strategy: &StrategyRef) {
    if !strategies.iter().any(|known| Arc::ptr_eq(known, strategy)) {
        strategies.push(strategy.clone());
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            max_repetitions: config.max_repetitions,
            ..Self::default()
        }
    }

    pub fn registrator(&mut self) -> Registrator<'_> {
        Registrator { normalizer: self }
    }

    /// Phase labels in execution order.
    pub fn phase_labels(&self) -> impl Iterator<Item = &str> {
        self.phases.iter().map(|(label, _)| label.as_str())
    }

    fn phase_mut(&mut self, label: &str) -> &mut Vec<StrategyRef> {
        let position = match self.phases.iter().position(|(known, _)| known == label) {
            Some(position) => position,
            None => {
                self.phases.push((label.to_owned(), Vec::new()));
                self.phases.len() - 1
            }
        };
        &mut self.phases[position].1
    }

    fn remove_phase(&mut self, label: &str) -> bool {
        let before = self.phases.len();
        self.phases.retain(|(known, _)| known != label);
        self.phases.len() != before
    }

    fn contains_phase(&self, label: &str) -> bool {
        self.phases.iter().any(|(known, _)| known == label)
    }

    /// The strategy the normalizer stands for:
    ///
    /// ```text
    /// repeat(sequence(
    ///     label("pre", repeat(fold(first_match(pre)))),
    ///     label(phase, repeat(first_match(fold(first_match(pre)), fold(first_match(phases so far))))),
    ///     ...
    ///     label("post", fold(first_match(post))),
    /// ))
    /// ```
    pub fn strategy(&self) -> StrategyRef {
        let max = self.max_repetitions;
        let pre = fold(first_match(self.pre.clone()));

        let mut groups = vec![label("pre", repeat(pre.clone(), max))];
        let mut accumulated = Vec::new();
        for (name, strategies) in &self.phases {
            strategies
                .iter()
                .for_each(|strategy| add_unique(&mut accumulated, strategy));
            let step = first_match(vec![pre.clone(), fold(first_match(accumulated.clone()))]);
            groups.push(label(name, repeat(step, max)));
        }
        groups.push(label("post", fold(first_match(self.post.clone()))));

        repeat(sequence(groups), max)
    }
}

impl Strategy for Normalizer {
    fn apply(&self, reference: &mut Reference<'_>, trace: &mut dyn Trace) -> Result<Did, EngineError> {
        self.strategy().apply(reference, trace)
    }

    fn name(&self) -> String {
        "normalize".to_owned()
    }
}

/// Registers strategies with a [`Normalizer`].
///
/// Registering returns the strategy, so it can be kept for other uses.
/// Registering the same strategy twice in one group has no effect.
pub struct Registrator<'n> {
    normalizer: &'n mut Normalizer,
}

impl Registrator<'_> {
    pub fn pre(&mut self, strategy: StrategyRef) -> StrategyRef {
        add_unique(&mut self.normalizer.pre, &strategy);
        strategy
    }

    pub fn post(&mut self, strategy: StrategyRef) -> StrategyRef {
        add_unique(&mut self.normalizer.post, &strategy);
        strategy
    }

    /// Adds to a phase, creating the phase after all existing ones if needed.
    pub fn phase(&mut self, label: &str, strategy: StrategyRef) -> StrategyRef {
        add_unique(self.normalizer.phase_mut(label), &strategy);
        strategy
    }

    pub fn remove_phase(&mut self, label: &str) -> bool {
        self.normalizer.remove_phase(label)
    }

    pub fn contains_phase(&self, label: &str) -> bool {
        self.normalizer.contains_phase(label)
    }

    /// Runs `f` with `strategies` added as an extra last phase.
    ///
    /// The extra phase is removed afterwards, also when `f` panics.
    pub fn with_temporary<R>(
        &mut self,
        strategies: Vec<StrategyRef>,
        f: impl FnOnce(&Normalizer) -> R,
    ) -> R {
        for strategy in strategies {
            self.phase(TEMPORARY_PHASE, strategy);
        }
        let guard = TemporaryPhase {
            normalizer: &mut *self.normalizer,
        };
        f(&*guard.normalizer)
    }
}

struct TemporaryPhase<'n> {
    normalizer: &'n mut Normalizer,
}

impl Drop for TemporaryPhase<'_> {
    fn drop(&mut self) {
        self.normalizer.remove_phase(TEMPORARY_PHASE);
    }
}
