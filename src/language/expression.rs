//! Immutable typed expressions.
//!
//! An [`Expr`] is a shared, immutable tree (in practice a DAG, since
//! subexpressions are reference counted). Its structural hash is computed once
//! on construction. Equality is structural and ignores the inferred return
//! types of calls, which are a function of the rest of the call anyway.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;

use super::constructor::Constructor;
use super::literal::{Literal, Opaque};
use super::types::{Binding, Type, TypeVar};
use super::wildcard::Wildcard;

static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(0);

/// Keyword arguments of a call; compared as a map.
pub type Kwargs = Vec<(Arc<str>, Expr)>;

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

struct ExprNode {
    kind: ExprKind,
    hash: u64,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Call(Call),
    Value(Value),
    Wildcard(Wildcard),
}

/// A constructor applied to arguments.
#[derive(Clone, Debug)]
pub struct Call {
    constructor: Constructor,
    args: Vec<Expr>,
    kwargs: Kwargs,
    ret: Type,
}

impl Call {
    pub(crate) fn new(constructor: Constructor, args: Vec<Expr>, kwargs: Kwargs, ret: Type) -> Self {
        Self {
            constructor,
            args,
            kwargs,
            ret,
        }
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn kwarg(&self, name: &str) -> Option<&Expr> {
        self.kwargs
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value)
    }

    /// Inferred return type.
    pub fn ret(&self) -> &Type {
        &self.ret
    }

    /// Positional arguments followed by keyword values.
    pub fn children(&self) -> impl Iterator<Item = &Expr> {
        self.args
            .iter()
            .chain(self.kwargs.iter().map(|(_, value)| value))
    }

    /// The same call with its children replaced, in [`children`](Self::children) order.
    ///
    /// The constructor and return type are kept as they are.
    pub fn with_children(&self, children: Vec<Expr>) -> Call {
        debug_assert_eq!(children.len(), self.args.len() + self.kwargs.len());
        let mut children = children.into_iter();
        let args = children.by_ref().take(self.args.len()).collect();
        let kwargs = self
            .kwargs
            .iter()
            .map(|(key, _)| key.clone())
            .zip(children)
            .collect();
        Call {
            constructor: self.constructor.clone(),
            args,
            kwargs,
            ret: self.ret.clone(),
        }
    }

    fn same_kwargs(&self, other: &Call) -> bool {
        self.kwargs.len() == other.kwargs.len()
            && self
                .kwargs
                .iter()
                .all(|(key, value)| other.kwarg(key) == Some(value))
    }
}

/// A host value with its type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    pub literal: Literal,
    pub ty: Type,
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        let hash = structural_hash(&kind);
        Self(Arc::new(ExprNode { kind, hash }))
    }

    pub(crate) fn from_call(call: Call) -> Self {
        Self::new(ExprKind::Call(call))
    }

    pub fn value(literal: Literal, ty: Type) -> Self {
        Self::new(ExprKind::Value(Value { literal, ty }))
    }

    /// A value typed with its literal's host type.
    pub fn literal(literal: Literal) -> Self {
        let ty = literal.host_type();
        Self::value(literal, ty)
    }

    pub fn int(value: i64) -> Self {
        Self::literal(Literal::Int(value))
    }

    pub fn uint(value: u64) -> Self {
        Self::literal(Literal::UInt(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    pub fn str(value: &str) -> Self {
        Self::literal(Literal::Str(value.into()))
    }

    pub fn type_value(ty: Type) -> Self {
        Self::literal(Literal::Type(ty))
    }

    pub fn opaque(opaque: Opaque, ty: Type) -> Self {
        Self::value(Literal::Opaque(opaque), ty)
    }

    pub fn wildcard(wildcard: Wildcard) -> Self {
        Self::new(ExprKind::Wildcard(wildcard))
    }

    /// A fresh placeholder standing for an unknown expression of type `ty`.
    ///
    /// Placeholders never compare equal to each other.
    pub fn placeholder(ty: Type) -> Self {
        let id = NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed);
        Self::from_call(Call::new(
            Constructor::placeholder().clone(),
            vec![Expr::uint(id)],
            Vec::new(),
            ty,
        ))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self.kind() {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self.kind() {
            ExprKind::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        self.as_value().map(|value| &value.literal)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.as_literal() {
            Some(Literal::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_wildcard(&self) -> Option<&Wildcard> {
        match self.kind() {
            ExprKind::Wildcard(wildcard) => Some(wildcard),
            _ => None,
        }
    }

    pub fn is_iterated(&self) -> bool {
        self.as_wildcard().is_some_and(Wildcard::is_iterated)
    }

    pub fn is_placeholder(&self) -> bool {
        self.as_call()
            .is_some_and(|call| call.constructor.is_placeholder())
    }

    /// Whether this is a call whose return type could not be inferred.
    pub fn is_ill_typed(&self) -> bool {
        self.as_call().is_some_and(|call| call.ret.is_unresolved())
    }

    pub fn ty(&self) -> Type {
        match self.kind() {
            ExprKind::Call(call) => call.ret.clone(),
            ExprKind::Value(value) => value.ty.clone(),
            ExprKind::Wildcard(wildcard) => wildcard.ty().clone(),
        }
    }

    /// The structural hash, cached at construction.
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    /// Whether both handles share the same allocation.
    pub fn same(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn children(&self) -> impl Iterator<Item = &Expr> {
        self.as_call().into_iter().flat_map(Call::children)
    }

    /// Distinct subexpressions in pre-order, starting with `self`.
    pub fn subterms(&self) -> Vec<Expr> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(expr) = stack.pop() {
            if !seen.insert(expr.clone()) {
                continue;
            }
            let children: Vec<Expr> = expr.children().cloned().collect();
            stack.extend(children.into_iter().rev());
            order.push(expr);
        }
        order
    }

    /// Computes a value bottom-up, visiting each distinct subexpression once.
    ///
    /// # Arguments
    ///
    /// * `f` - Called with an expression and the results of its children,
    ///   in [`Call::children`] order
    pub fn fold<T: Clone>(&self, f: &mut impl FnMut(&Expr, Vec<T>) -> T) -> T {
        self.fold_memo(f, &mut HashMap::new())
    }

    fn fold_memo<T: Clone, F: FnMut(&Expr, Vec<T>) -> T>(
        &self,
        f: &mut F,
        memo: &mut HashMap<Expr, T>,
    ) -> T {
        if let Some(done) = memo.get(self) {
            return done.clone();
        }
        let children = self
            .children()
            .map(|child| child.fold_memo(f, memo))
            .collect();
        let result = f(self, children);
        memo.insert(self.clone(), result.clone());
        result
    }

    /// Rebuilds the expression top-down; `f` returning `Some` replaces a
    /// subexpression without descending into it.
    pub fn transform(&self, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Expr {
        self.transform_memo(f, &mut HashMap::new())
    }

    fn transform_memo<F: FnMut(&Expr) -> Option<Expr>>(
        &self,
        f: &mut F,
        memo: &mut HashMap<Expr, Expr>,
    ) -> Expr {
        if let Some(done) = memo.get(self) {
            return done.clone();
        }
        let result = match f(self) {
            Some(replacement) => replacement,
            None => match self.kind() {
                ExprKind::Call(call) => {
                    let children = call
                        .children()
                        .map(|child| child.transform_memo(f, memo))
                        .collect();
                    Expr::from_call(call.with_children(children))
                }
                _ => self.clone(),
            },
        };
        memo.insert(self.clone(), result.clone());
        result
    }

    /// Replaces every occurrence of the mapping's keys.
    pub fn replace_values(&self, mapping: &HashMap<Expr, Expr>) -> Expr {
        if mapping.is_empty() {
            return self.clone();
        }
        self.transform(&mut |expr| mapping.get(expr).cloned())
    }

    /// Applies a type binding to every type inside the expression.
    pub fn substitute_types(&self, binding: &Binding) -> Expr {
        if binding.is_empty() {
            return self.clone();
        }
        self.fold(&mut |expr: &Expr, children: Vec<Expr>| match expr.kind() {
            ExprKind::Call(call) => {
                let rebuilt = call.with_children(children);
                Expr::from_call(Call {
                    constructor: rebuilt.constructor.substitute(binding),
                    ret: rebuilt.ret.substitute(binding),
                    ..rebuilt
                })
            }
            ExprKind::Value(value) => {
                let literal = match &value.literal {
                    Literal::Type(ty) => Literal::Type(ty.substitute(binding)),
                    other => other.clone(),
                };
                Expr::value(literal, value.ty.substitute(binding))
            }
            ExprKind::Wildcard(wildcard) => {
                Expr::wildcard(wildcard.with_type(wildcard.ty().substitute(binding)))
            }
        })
    }

    /// Type variables anywhere in the expression, in order of first appearance.
    pub fn free_type_vars(&self) -> Vec<TypeVar> {
        let mut vars = Vec::new();
        for expr in self.subterms() {
            match expr.kind() {
                ExprKind::Call(call) => {
                    if let Some(owner) = call.constructor.owner() {
                        owner.collect_vars(&mut vars);
                    }
                    call.ret.collect_vars(&mut vars);
                }
                ExprKind::Value(value) => {
                    value.ty.collect_vars(&mut vars);
                    if let Literal::Type(ty) = &value.literal {
                        ty.collect_vars(&mut vars);
                    }
                }
                ExprKind::Wildcard(wildcard) => wildcard.ty().collect_vars(&mut vars),
            }
        }
        vars
    }

    /// Distinct wildcards occurring in the expression.
    pub fn wildcards(&self) -> Vec<Wildcard> {
        self.subterms()
            .iter()
            .filter_map(Expr::as_wildcard)
            .cloned()
            .unique()
            .collect()
    }
}

fn structural_hash(kind: &ExprKind) -> u64 {
    let mut hasher = DefaultHasher::new();
    match kind {
        ExprKind::Call(call) => {
            0u8.hash(&mut hasher);
            call.constructor.hash(&mut hasher);
            for arg in &call.args {
                arg.hash_value().hash(&mut hasher);
            }
            // Order-independent, since keyword arguments compare as a map.
            let kwargs = call.kwargs.iter().fold(0u64, |acc, (key, value)| {
                let mut entry = DefaultHasher::new();
                key.hash(&mut entry);
                value.hash_value().hash(&mut entry);
                acc.wrapping_add(entry.finish())
            });
            kwargs.hash(&mut hasher);
        }
        ExprKind::Value(value) => {
            1u8.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        ExprKind::Wildcard(wildcard) => {
            2u8.hash(&mut hasher);
            wildcard.hash(&mut hasher);
        }
    }
    hasher.finish()
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.same(other) {
            return true;
        }
        if self.hash_value() != other.hash_value() {
            return false;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Call(a), ExprKind::Call(b)) => {
                a.constructor == b.constructor && a.args == b.args && a.same_kwargs(b)
            }
            (ExprKind::Value(a), ExprKind::Value(b)) => a == b,
            (ExprKind::Wildcard(a), ExprKind::Wildcard(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Call(call) if call.constructor.is_placeholder() => {
                write!(f, "<{}>", call.ret)
            }
            ExprKind::Call(call) => {
                if let Some(owner) = call.constructor.owner() {
                    write!(f, "{owner}.")?;
                }
                let args = call.args.iter().map(ToString::to_string);
                let kwargs = call
                    .kwargs
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"));
                write!(f, "{}({})", call.constructor.name(), args.chain(kwargs).join(", "))
            }
            ExprKind::Value(value) => write!(f, "{}", value.literal),
            ExprKind::Wildcard(wildcard) => write!(f, "{wildcard}"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
