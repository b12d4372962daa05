use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reductio::config::EngineConfig;
use reductio::error::NoMatch;
use reductio::language::{Constructor, Expr, Type, TypeName};
use reductio::rewriting::executor::Executor;
use reductio::rewriting::matching::Match;
use reductio::rewriting::normalize::Normalizer;
use reductio::rewriting::rule::{MatchRule, Replacement};
use reductio::rewriting::strategy::IntoStrategy;
use reductio::trace::TraceLog;

#[derive(Parser, Debug)]
#[command(author, version, about = "Normalize a few arithmetic expressions and show the trace", long_about = None)]
struct Args {
    /// Engine configuration (JSON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Where to save the trace as JSON
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

struct Arith {
    from_int: Constructor,
    add: Constructor,
    mul: Constructor,
    symbol: Constructor,
}

impl Arith {
    fn new() -> Self {
        let int = TypeName::new("Int", 0).ty();
        let binary = |name: &str| {
            Constructor::builder(name)
                .param("left", int.clone())
                .param("right", int.clone())
                .ret(int.clone())
                .build()
        };
        Self {
            from_int: Constructor::builder("from_int")
                .classmethod(int.clone())
                .param("i", Type::int())
                .ret(int.clone())
                .build(),
            add: binary("add"),
            mul: binary("mul"),
            symbol: Constructor::builder("symbol")
                .param("name", Type::str())
                .ret(int.clone())
                .build(),
        }
    }

    fn int(&self, value: i64) -> Expr {
        self.from_int.call(vec![Expr::int(value)])
    }

    fn value_of(&self, expr: &Expr) -> Result<i64, NoMatch> {
        expr.as_call()
            .filter(|call| call.constructor().same_definition(&self.from_int))
            .and_then(|call| call.args()[0].as_int())
            .ok_or_else(|| NoMatch::new(format!("{expr} is not a known integer")))
    }

    /// Folds `op` applied to two known integers.
    fn constant_rule(self: &Arc<Self>, op: &Constructor, f: fn(i64, i64) -> i64) -> anyhow::Result<MatchRule> {
        let int = TypeName::new("Int", 0).ty();
        let this = Arc::clone(self);
        Ok(MatchRule::new(format!("{}_constants", op.name()), |rb| {
            let x = rb.wildcard("x", int.clone());
            let y = rb.wildcard("y", int);
            let template = op.call(vec![x.expr(), y.expr()]);
            rb.branch(
                template,
                Replacement::thunk(move |m: &Match| {
                    let left = this.value_of(m.one(&x)?)?;
                    let right = this.value_of(m.one(&y)?)?;
                    Ok(this.int(f(left, right)))
                }),
            );
        })?)
    }

    fn identity_rule(&self) -> anyhow::Result<MatchRule> {
        let int = TypeName::new("Int", 0).ty();
        Ok(MatchRule::new("identities", |rb| {
            let x = rb.wildcard("x", int);
            rb.branch(self.add.call(vec![x.expr(), self.int(0)]), x.expr());
            rb.branch(self.mul.call(vec![x.expr(), self.int(1)]), x.expr());
            rb.branch(self.mul.call(vec![x.expr(), self.int(0)]), self.int(0));
        })?)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let arith = Arc::new(Arith::new());
    let mut normalizer = Normalizer::with_config(&config);
    let mut registrator = normalizer.registrator();
    registrator.phase("constants", arith.constant_rule(&arith.add, |a, b| a + b)?.into_strategy());
    registrator.phase("constants", arith.constant_rule(&arith.mul, |a, b| a * b)?.into_strategy());
    registrator.phase("identities", arith.identity_rule()?.into_strategy());

    let x = arith.symbol.call(vec![Expr::str("x")]);
    let expressions = vec![
        arith.add.call(vec![arith.int(1), arith.mul.call(vec![arith.int(2), arith.int(3)])]),
        arith.mul.call(vec![
            arith.add.call(vec![x.clone(), arith.add.call(vec![arith.int(-4), arith.int(4)])]),
            arith.int(1),
        ]),
        arith.mul.call(vec![x, arith.add.call(vec![arith.int(2), arith.int(-2)])]),
    ];

    let executor = Executor::new(Arc::new(normalizer)).with_config(config);
    let mut log = TraceLog::default();
    for expr in &expressions {
        let result = executor.execute_traced(expr, &mut log)?;
        println!("{expr}\n  => {result}");
    }

    println!("\n{}", log.pretty());
    println!("{}", log.summary_table());
    if let Some(output) = &args.output {
        log.save(output)?;
    }
    Ok(())
}
