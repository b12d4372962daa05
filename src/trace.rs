//! Recording and reporting the steps of an execution.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use colored::*;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled, settings::Style};

use crate::rewriting::graph::ExprGraph;
use crate::rewriting::strategy::{StepResult, Trace};
use crate::utils::json::{load_json, save_json};

/// A result together with the whole expression right after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub result: StepResult,
    pub expression: String,
}

/// A [`Trace`] keeping every step of an execution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TraceLog {
    steps: Vec<TraceStep>,
}

#[derive(Tabled)]
struct RuleCount {
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Firings")]
    firings: usize,
}

impl Trace for TraceLog {
    fn record(&mut self, result: StepResult, graph: &ExprGraph) {
        self.steps.push(TraceStep {
            result,
            expression: graph.root_expression().to_string(),
        });
    }
}

impl TraceLog {
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Labels of the groups that replaced something, in order.
    pub fn labels(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| step.result.label.as_deref())
            .collect()
    }

    /// Names of the rules that fired, in order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| !step.result.is_label())
            .map(|step| step.result.name.as_str())
            .collect()
    }

    /// One line per step: labels in bold, rule names in green, followed by
    /// the expression after the step.
    pub fn pretty(&self) -> String {
        let mut buffer = String::new();
        for (index, step) in self.steps.iter().enumerate() {
            let name = match &step.result.label {
                Some(label) => format!("[{label}]").bold(),
                None => step.result.name.green(),
            };
            let _ = writeln!(buffer, "{:>4} {name} {}", index + 1, step.expression.dimmed());
        }
        buffer
    }

    /// A table of how often each rule fired.
    pub fn summary_table(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in self.rule_names() {
            *counts.entry(name).or_default() += 1;
        }
        if counts.is_empty() {
            return String::new();
        }
        let rows = counts.into_iter().map(|(rule, firings)| RuleCount {
            rule: rule.to_owned(),
            firings,
        });
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        table.to_string()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        save_json(self, path)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        load_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriting::executor::Executor;
    use crate::rewriting::strategy::{fold, label};
    use crate::testing::arith;

    fn traced() -> TraceLog {
        let a = arith();
        let strategy = label("arith", fold(a.add_ints_rule()));
        let expr = a.add.call(vec![a.add.call(vec![a.int(1), a.int(2)]), a.int(3)]);
        let mut log = TraceLog::default();
        Executor::new(strategy).execute_traced(&expr, &mut log).unwrap();
        log
    }

    #[test]
    fn labels_and_rules_are_separated() {
        let log = traced();
        assert_eq!(log.len(), 4);
        assert_eq!(log.rule_names(), ["add_ints", "add_ints"]);
        assert_eq!(log.labels(), ["arith", "arith"]);
    }

    #[test]
    fn summary_counts_firings() {
        colored::control::set_override(false);
        let table = traced().summary_table();
        assert!(table.contains("Firings"));
        assert!(table.contains("add_ints"));
        assert!(table.contains('2'));
        assert!(TraceLog::default().summary_table().is_empty());
    }

    #[test]
    fn pretty_lists_every_step() {
        colored::control::set_override(false);
        let pretty = traced().pretty();
        assert_eq!(pretty.lines().count(), 4);
        assert!(pretty.lines().last().unwrap().contains("Int.from_int(6)"));
    }

    #[test]
    fn survives_a_json_round_trip() {
        let log = traced();
        let path = std::env::temp_dir().join(format!("reductio-trace-{}.json", std::process::id()));
        log.save(&path).unwrap();
        let loaded = TraceLog::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.steps(), log.steps());
        assert!(log.to_json().unwrap().contains("\"add_ints\""));
    }
}
