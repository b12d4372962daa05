//! Small languages shared by the unit tests.

use std::sync::Arc;

use crate::error::NoMatch;
use crate::language::constructor::{Constructor, Invocation};
use crate::language::expression::Expr;
use crate::language::literal::Opaque;
use crate::language::types::{Type, TypeName, TypeVar};
use crate::rewriting::matching::Match;
use crate::rewriting::rule::{MatchRule, Replacement};

/// Integers with addition, negation and opaque symbols.
#[derive(Clone)]
pub struct Arith {
    pub int_ty: TypeName,
    pub from_int: Constructor,
    pub add: Constructor,
    pub neg: Constructor,
    pub symbol: Constructor,
    pub box_int: Constructor,
    pub wrapper: Constructor,
}

pub fn arith() -> Arith {
    let int_ty = TypeName::new("Int", 0);
    let int = int_ty.ty();
    Arith {
        from_int: Constructor::builder("from_int")
            .classmethod(int.clone())
            .param("i", Type::int())
            .ret(int.clone())
            .build(),
        add: Constructor::builder("add")
            .param("left", int.clone())
            .param("right", int.clone())
            .ret(int.clone())
            .build(),
        neg: Constructor::builder("neg").param("x", int.clone()).ret(int.clone()).build(),
        symbol: Constructor::builder("symbol")
            .param("name", Type::str())
            .ret(int.clone())
            .build(),
        box_int: Constructor::builder("box_int")
            .param("i", Type::int())
            .ret(int.clone())
            .build(),
        wrapper: Constructor::builder("wrapper")
            .param("x", int)
            .ret(TypeName::new("Wrapped", 0).ty())
            .build(),
        int_ty,
    }
}

impl Arith {
    pub fn int(&self, value: i64) -> Expr {
        self.from_int.call(vec![Expr::int(value)])
    }

    pub fn symbol(&self, name: &str) -> Expr {
        self.symbol.call(vec![Expr::str(name)])
    }

    pub fn boxed(&self, value: i64) -> Expr {
        self.box_int.call(vec![Expr::int(value)])
    }

    fn from_int_value(&self, expr: &Expr) -> Result<i64, NoMatch> {
        expr.as_call()
            .filter(|call| call.constructor().same_definition(&self.from_int))
            .and_then(|call| call.args()[0].as_int())
            .ok_or_else(|| NoMatch::new(format!("{expr} is not an integer")))
    }

    /// `add(from_int(i), from_int(j)) -> from_int(i + j)`
    pub fn add_ints_rule(&self) -> MatchRule {
        let int = self.int_ty.ty();
        let add = self.add.clone();
        let this = Arc::new(self.clone());
        MatchRule::new("add_ints", |rb| {
            let x = rb.wildcard("x", int.clone());
            let y = rb.wildcard("y", int);
            let (tx, ty) = (x.clone(), y.clone());
            rb.branch(
                add.call(vec![x.expr(), y.expr()]),
                Replacement::thunk(move |m: &Match| {
                    let left = this.from_int_value(m.one(&tx)?)?;
                    let right = this.from_int_value(m.one(&ty)?)?;
                    Ok(this.int(left + right))
                }),
            );
        })
        .unwrap()
    }

    pub fn add_zero_rule(&self) -> MatchRule {
        let int = self.int_ty.ty();
        MatchRule::new("add_zero", |rb| {
            let x = rb.wildcard("x", int);
            rb.branch(self.add.call(vec![x.expr(), self.int(0)]), x.expr());
            rb.branch(self.add.call(vec![self.int(0), x.expr()]), x.expr());
        })
        .unwrap()
    }

    /// `box_int(i) -> from_int(i)`
    pub fn unbox_rule(&self) -> MatchRule {
        MatchRule::new("unbox", |rb| {
            let i = rb.wildcard("i", Type::int());
            rb.branch(self.box_int.call(vec![i.expr()]), self.from_int.call(vec![i.expr()]));
        })
        .unwrap()
    }

    /// `from_int(i) -> neg(from_int(i))`, which never terminates.
    pub fn grow_rule(&self) -> MatchRule {
        MatchRule::new("grow", |rb| {
            let i = rb.wildcard("i", Type::int());
            let int = self.from_int.call(vec![i.expr()]);
            rb.branch(int.clone(), self.neg.call(vec![int]));
        })
        .unwrap()
    }
}

/// Generic lists: `List[T].create(*items)` and `concat`.
pub struct Lists {
    pub list: TypeName,
    pub t: TypeVar,
    pub create: Constructor,
    pub concat: Constructor,
}

pub fn lists() -> Lists {
    let list = TypeName::new("List", 1);
    let t = TypeVar::fresh("T");
    let list_t = list.of(vec![Type::var(&t)]);
    Lists {
        create: Constructor::builder("create")
            .classmethod(list_t.clone())
            .variadic("items", Type::var(&t))
            .ret(list_t.clone())
            .build(),
        concat: Constructor::builder("concat")
            .param("left", list_t.clone())
            .param("right", list_t.clone())
            .ret(list_t)
            .build(),
        list,
        t,
    }
}

impl Lists {
    /// `concat(create(*xs), create(*ys)) -> create(*xs, *ys)`
    pub fn concat_rule(&self) -> MatchRule {
        MatchRule::new("concat", |rb| {
            let xs = rb.iterated("xs", Type::var(&self.t));
            let ys = rb.iterated("ys", Type::var(&self.t));
            rb.branch(
                self.concat.call(vec![
                    self.create.call(vec![xs.expr()]),
                    self.create.call(vec![ys.expr()]),
                ]),
                self.create.call(vec![xs.expr(), ys.expr()]),
            );
        })
        .unwrap()
    }
}

/// A typed lambda calculus with a fixpoint combinator.
pub struct Lambda {
    pub int_ty: TypeName,
    pub abs: TypeName,
    pub from_int: Constructor,
    pub variable: Constructor,
    pub create: Constructor,
    pub apply: Constructor,
    pub fix: Constructor,
}

pub fn lambda() -> Lambda {
    let int_ty = TypeName::new("Int", 0);
    let abs = TypeName::new("Abs", 2);
    let (a, b, t) = (TypeVar::fresh("A"), TypeVar::fresh("B"), TypeVar::fresh("T"));
    let abs_ab = abs.of(vec![Type::var(&a), Type::var(&b)]);

    let apply = Constructor::builder("apply")
        .param("fn", abs_ab.clone())
        .param("arg", Type::var(&a))
        .ret(Type::var(&b))
        .build();
    let apply_in_body = apply.clone();
    let fix = Constructor::builder("fix")
        .param("fn", abs.of(vec![Type::var(&t), Type::var(&t)]))
        .ret(Type::var(&t))
        .body(move |inv: &Invocation<'_>| {
            let f = inv.args()[0].clone();
            let again = inv.constructor().call(vec![f.clone()]);
            apply_in_body.call(vec![f, again])
        })
        .build();

    Lambda {
        from_int: Constructor::builder("from_int")
            .classmethod(int_ty.ty())
            .param("i", Type::int())
            .ret(int_ty.ty())
            .build(),
        variable: Constructor::builder("variable")
            .param("id", Type::Any)
            .param("ty", Type::meta(Type::var(&t)))
            .ret(Type::var(&t))
            .build(),
        create: Constructor::builder("create")
            .classmethod(abs_ab.clone())
            .param("var", Type::var(&a))
            .param("body", Type::var(&b))
            .ret(abs_ab)
            .build(),
        apply,
        fix,
        int_ty,
        abs,
    }
}

impl Lambda {
    pub fn int(&self, value: i64) -> Expr {
        self.from_int.call(vec![Expr::int(value)])
    }

    /// A fresh variable; two calls never give equal variables.
    pub fn variable(&self, name: &str, ty: Type) -> Expr {
        let id = Expr::opaque(Opaque::new(name, ()), Type::opaque("Id"));
        self.variable.call(vec![id, Expr::type_value(ty)])
    }

    pub fn abs_create(&self, var: Expr, body: Expr) -> Expr {
        self.create.call(vec![var, body])
    }

    /// `apply(create(v, body), arg) -> body[v := arg]`, respecting shadowing.
    pub fn beta_rule(&self) -> MatchRule {
        let (a, b) = (TypeVar::fresh("A"), TypeVar::fresh("B"));
        let create = self.create.clone();
        MatchRule::new("beta", |rb| {
            let var = rb.wildcard("var", Type::var(&a));
            let body = rb.wildcard("body", Type::var(&b));
            let arg = rb.wildcard("arg", Type::var(&a));
            let template = self.apply.call(vec![
                self.create.call(vec![var.expr(), body.expr()]),
                arg.expr(),
            ]);
            rb.branch(
                template,
                Replacement::thunk(move |m: &Match| {
                    let var = m.one(&var)?;
                    let arg = m.one(&arg)?;
                    Ok(m.one(&body)?.transform(&mut |expr| {
                        if expr == var {
                            return Some(arg.clone());
                        }
                        let shadows = expr.as_call().is_some_and(|call| {
                            call.constructor().same_definition(&create) && &call.args()[0] == var
                        });
                        shadows.then(|| expr.clone())
                    }))
                }),
            );
        })
        .unwrap()
    }
}
