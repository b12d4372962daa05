//! Typed constructors.
//!
//! A [`Constructor`] is the head symbol of a call expression. It carries a
//! [`Signature`] used to infer the return type of every call, an optional
//! owner type (for constructors that behave like classmethods of a generic
//! type) and an optional body, which becomes a default rewrite rule.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use tracing::debug;
use trait_set::trait_set;

use super::expression::{Call, Expr, Kwargs};
use super::infer::{bind_arguments, infer_types};
use super::types::{Binding, Type, TypeVar};
use crate::error::EngineError;

static NEXT_CONSTRUCTOR: AtomicU64 = AtomicU64::new(0);

static PLACEHOLDER: LazyLock<Constructor> = LazyLock::new(|| {
    ConstructorBuilder::new("placeholder")
        .param("id", Type::uint())
        .ret(Type::Any)
        .build()
});

trait_set! {
    pub trait BodyFn = Fn(&Invocation<'_>) -> Expr + Send + Sync + 'static;
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Arc<str>,
    pub ty: Type,
    pub default: Option<Expr>,
}

impl Param {
    fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}

/// Declared parameters and return type of a constructor.
#[derive(Clone, Debug)]
pub struct Signature {
    pub params: Vec<Param>,
    /// Parameter collecting the remaining positional arguments
    pub variadic: Option<Param>,
    pub keywords: Vec<Param>,
    pub ret: Type,
}

impl Signature {
    /// Every type variable mentioned by the signature.
    pub fn type_vars(&self) -> Vec<TypeVar> {
        let mut vars = Vec::new();
        self.params
            .iter()
            .chain(&self.variadic)
            .chain(&self.keywords)
            .for_each(|param| param.ty.collect_vars(&mut vars));
        self.ret.collect_vars(&mut vars);
        vars
    }
}

struct ConstructorDef {
    id: u64,
    name: Arc<str>,
    signature: Signature,
    owner: Option<Type>,
    body: Option<Arc<dyn BodyFn>>,
}

/// Handle to a constructor definition, possibly with a resolved owner type.
///
/// Two handles are equal when they refer to the same definition with the same owner.
#[derive(Clone)]
pub struct Constructor {
    def: Arc<ConstructorDef>,
    owner: Option<Type>,
}

impl Constructor {
    pub fn builder(name: &str) -> ConstructorBuilder {
        ConstructorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn signature(&self) -> &Signature {
        &self.def.signature
    }

    /// Owner type as declared, possibly generic.
    pub fn declared_owner(&self) -> Option<&Type> {
        self.def.owner.as_ref()
    }

    /// Owner type this handle is bound to, if any.
    pub fn owner(&self) -> Option<&Type> {
        self.owner.as_ref()
    }

    pub fn is_classmethod(&self) -> bool {
        self.def.owner.is_some()
    }

    pub fn has_body(&self) -> bool {
        self.def.body.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        self.same_definition(&PLACEHOLDER)
    }

    pub fn same_definition(&self, other: &Constructor) -> bool {
        self.def.id == other.def.id
    }

    /// The same constructor bound to a concrete owner, e.g. `List[int].create`.
    pub fn with_owner(&self, owner: Type) -> Self {
        Self {
            def: self.def.clone(),
            owner: Some(owner),
        }
    }

    pub(crate) fn with_resolved_owner(&self, owner: Option<Type>) -> Self {
        Self {
            def: self.def.clone(),
            owner: owner.or_else(|| self.owner.clone()),
        }
    }

    pub fn substitute(&self, binding: &Binding) -> Self {
        Self {
            def: self.def.clone(),
            owner: self.owner.as_ref().map(|owner| owner.substitute(binding)),
        }
    }

    pub fn call(&self, args: Vec<Expr>) -> Expr {
        self.call_kw(args, Vec::new())
    }

    /// Builds a call, inferring its return type.
    ///
    /// An ill-typed call is still built; its return type is
    /// [`Type::Unresolved`] and no typed rule will match it.
    ///
    /// # Panics
    ///
    /// When the arguments do not fit the signature. Use
    /// [`try_call_kw`](Self::try_call_kw) to get the error instead.
    pub fn call_kw(&self, args: Vec<Expr>, kwargs: Vec<(&str, Expr)>) -> Expr {
        let kwargs = kwargs
            .into_iter()
            .map(|(name, value)| (Arc::from(name), value))
            .collect();
        let (args, kwargs) = match bind_arguments(self, args, kwargs) {
            Ok(bound) => bound,
            Err(error) => panic!("{error}"),
        };
        match infer_types(self, &args, &kwargs) {
            Ok(inferred) => Expr::from_call(Call::new(
                self.with_resolved_owner(inferred.owner),
                args,
                kwargs,
                inferred.ret,
            )),
            Err(error) => {
                debug!(constructor = %self.name(), %error, "return type left unresolved");
                Expr::from_call(Call::new(self.clone(), args, kwargs, Type::Unresolved))
            }
        }
    }

    pub fn try_call(&self, args: Vec<Expr>) -> Result<Expr, EngineError> {
        self.try_call_kw(args, Vec::new())
    }

    /// Like [`call_kw`](Self::call_kw) but fails instead of leaving the type unresolved.
    pub fn try_call_kw(&self, args: Vec<Expr>, kwargs: Vec<(&str, Expr)>) -> Result<Expr, EngineError> {
        let kwargs = kwargs
            .into_iter()
            .map(|(name, value)| (Arc::from(name), value))
            .collect();
        let (args, kwargs) = bind_arguments(self, args, kwargs)?;
        let inferred = infer_types(self, &args, &kwargs)?;
        Ok(Expr::from_call(Call::new(
            self.with_resolved_owner(inferred.owner),
            args,
            kwargs,
            inferred.ret,
        )))
    }

    pub(crate) fn invoke_body(&self, invocation: &Invocation<'_>) -> Option<Expr> {
        self.def.body.as_ref().map(|body| body(invocation))
    }

    pub(crate) fn placeholder() -> &'static Constructor {
        &PLACEHOLDER
    }
}

impl PartialEq for Constructor {
    fn eq(&self, other: &Self) -> bool {
        self.def.id == other.def.id && self.owner == other.owner
    }
}

impl Eq for Constructor {}

impl Hash for Constructor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.def.id.hash(state);
        self.owner.hash(state);
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{owner}.{}", self.def.name),
            None => write!(f, "{}", self.def.name),
        }
    }
}

/// Declares a constructor.
///
/// ```
/// # use reductio::language::{constructor::Constructor, types::{Type, TypeName}};
/// let int = TypeName::new("Int", 0).ty();
/// let add = Constructor::builder("add")
///     .param("left", int.clone())
///     .param("right", int.clone())
///     .ret(int)
///     .build();
/// assert_eq!(add.signature().params.len(), 2);
/// ```
pub struct ConstructorBuilder {
    name: Arc<str>,
    signature: Signature,
    owner: Option<Type>,
    body: Option<Arc<dyn BodyFn>>,
}

impl ConstructorBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            signature: Signature {
                params: Vec::new(),
                variadic: None,
                keywords: Vec::new(),
                ret: Type::Any,
            },
            owner: None,
            body: None,
        }
    }

    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.signature.params.push(Param::new(name, ty));
        self
    }

    pub fn variadic(mut self, name: &str, ty: Type) -> Self {
        self.signature.variadic = Some(Param::new(name, ty));
        self
    }

    pub fn keyword(mut self, name: &str, ty: Type) -> Self {
        self.signature.keywords.push(Param::new(name, ty));
        self
    }

    pub fn keyword_default(mut self, name: &str, ty: Type, default: Expr) -> Self {
        self.signature.keywords.push(Param {
            default: Some(default),
            ..Param::new(name, ty)
        });
        self
    }

    /// Makes the constructor a classmethod of `owner`, which may be generic.
    pub fn classmethod(mut self, owner: Type) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn ret(mut self, ty: Type) -> Self {
        self.signature.ret = ty;
        self
    }

    /// Gives the constructor a body, used by [`DefaultRule`](crate::rewriting::rule::DefaultRule).
    pub fn body(mut self, body: impl BodyFn) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn build(self) -> Constructor {
        Constructor {
            def: Arc::new(ConstructorDef {
                id: NEXT_CONSTRUCTOR.fetch_add(1, Ordering::Relaxed),
                name: self.name,
                signature: self.signature,
                owner: self.owner,
                body: self.body,
            }),
            owner: None,
        }
    }
}

/// A call seen from inside a constructor body.
pub struct Invocation<'a> {
    call: &'a Call,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(call: &'a Call) -> Self {
        Self { call }
    }

    pub fn constructor(&self) -> &Constructor {
        self.call.constructor()
    }

    pub fn owner(&self) -> Option<&Type> {
        self.call.constructor().owner()
    }

    pub fn args(&self) -> &[Expr] {
        self.call.args()
    }

    pub fn arg(&self, index: usize) -> Option<&Expr> {
        self.call.args().get(index)
    }

    pub fn kwargs(&self) -> &Kwargs {
        self.call.kwargs()
    }

    pub fn kwarg(&self, name: &str) -> Option<&Expr> {
        self.call.kwarg(name)
    }

    pub fn ret(&self) -> &Type {
        self.call.ret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::types::TypeName;

    fn int() -> Type {
        TypeName::new("Int", 0).ty()
    }

    #[test]
    fn handles_compare_by_definition_and_owner() {
        let f = Constructor::builder("f").ret(int()).build();
        let g = Constructor::builder("f").ret(int()).build();
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
        assert!(f.same_definition(&f.with_owner(int())));
        assert_ne!(f, f.with_owner(int()));
    }

    #[test]
    fn simple_call_is_typed() {
        let one = Constructor::builder("one").ret(int()).build();
        let neg = Constructor::builder("neg").param("x", int()).ret(int()).build();
        let expr = neg.call(vec![one.call(vec![])]);
        assert_eq!(expr.ty(), int());
    }

    #[test]
    fn ill_typed_call_is_unresolved() {
        let neg = Constructor::builder("neg").param("x", int()).ret(int()).build();
        let expr = neg.call(vec![Expr::str("nope")]);
        assert_eq!(expr.ty(), Type::Unresolved);
        assert!(matches!(
            neg.try_call(vec![Expr::str("nope")]),
            Err(EngineError::IllTyped { .. })
        ));
    }

    #[test]
    fn wrong_arity_is_an_error() {
        let neg = Constructor::builder("neg").param("x", int()).ret(int()).build();
        assert!(matches!(neg.try_call(vec![]), Err(EngineError::Arity { .. })));
        assert!(matches!(
            neg.try_call(vec![Expr::int(1), Expr::int(2)]),
            Err(EngineError::Arity { .. })
        ));
    }

    #[test]
    #[should_panic]
    fn infallible_call_panics_on_arity() {
        let neg = Constructor::builder("neg").param("x", int()).ret(int()).build();
        neg.call(vec![]);
    }

    #[test]
    fn keywords_fill_defaults_in_declared_order() {
        let f = Constructor::builder("f")
            .keyword_default("a", Type::int(), Expr::int(1))
            .keyword("b", Type::int())
            .ret(int())
            .build();
        let expr = f.call_kw(vec![], vec![("b", Expr::int(2))]);
        let call = expr.as_call().unwrap();
        let names: Vec<&str> = call.kwargs().iter().map(|(name, _)| &**name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(call.kwarg("a"), Some(&Expr::int(1)));

        assert!(matches!(f.try_call(vec![]), Err(EngineError::Arity { .. })));
        assert!(matches!(
            f.try_call_kw(vec![], vec![("b", Expr::int(2)), ("c", Expr::int(3))]),
            Err(EngineError::Arity { .. })
        ));
    }

    #[test]
    fn signature_type_vars() {
        let t = TypeVar::fresh("T");
        let u = TypeVar::fresh("U");
        let f = Constructor::builder("f")
            .param("x", Type::var(&t))
            .variadic("rest", Type::var(&u))
            .ret(Type::var(&t))
            .build();
        assert_eq!(f.signature().type_vars(), vec![t, u]);
    }

    #[test]
    fn body_sees_the_invocation() {
        let scaled = Constructor::builder("scaled")
            .classmethod(int())
            .param("x", Type::int())
            .keyword_default("factor", Type::int(), Expr::int(2))
            .ret(int())
            .body(|inv: &Invocation<'_>| {
                let x = inv.arg(0).and_then(Expr::as_int).unwrap_or_default();
                let factor = inv.kwarg("factor").and_then(Expr::as_int).unwrap_or_default();
                assert_eq!(inv.owner(), Some(&int()));
                assert_eq!(inv.ret(), &int());
                Expr::int(x * factor)
            })
            .build();
        let expr = scaled.call(vec![Expr::int(21)]);
        let call = expr.as_call().unwrap();
        assert_eq!(call.constructor().invoke_body(&Invocation::new(call)), Some(Expr::int(42)));
    }
}
