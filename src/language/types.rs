//! Static types of expressions.
//!
//! Types are plain data: concrete types with arguments, type variables,
//! opaque host types, meta types (the type of a type value) and unions.
//! Matching a declared type against an actual one produces a [`Binding`],
//! and bindings combine only when they agree on every shared variable.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;
use thiserror::Error;

static NEXT_TYPE_VAR: AtomicU64 = AtomicU64::new(0);

/// A type variable.
///
/// Variables compare by identity: two calls to [`TypeVar::fresh`] with the same
/// name still give different variables.
#[derive(Clone, Debug)]
pub struct TypeVar {
    id: u64,
    name: Arc<str>,
}

impl TypeVar {
    pub fn fresh(name: &str) -> Self {
        Self {
            id: NEXT_TYPE_VAR.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeVar {}

impl Hash for TypeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}", self.name)
    }
}

/// Name of a (possibly generic) concrete type, e.g. `List` with arity 1.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeName {
    name: Arc<str>,
    arity: usize,
}

impl TypeName {
    pub fn new(name: &str, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Applies the type name to its arguments.
    ///
    /// # Panics
    ///
    /// When the number of arguments differs from the arity.
    pub fn of(&self, args: Vec<Type>) -> Type {
        assert_eq!(
            args.len(),
            self.arity,
            "type `{}` takes {} arguments",
            self.name,
            self.arity
        );
        Type::Concrete(self.clone(), args)
    }

    /// The type itself, for names without arguments.
    pub fn ty(&self) -> Type {
        self.of(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Concrete(TypeName, Vec<Type>),
    Var(TypeVar),
    /// A host type known only by name
    Opaque(Arc<str>),
    /// The type of values which are themselves types
    Meta(Box<Type>),
    Union(Vec<Type>),
    /// Matches anything
    Any,
    /// Return type of a call whose inference failed
    Unresolved,
}

impl Type {
    pub fn var(var: &TypeVar) -> Self {
        Type::Var(var.clone())
    }

    pub fn opaque(name: &str) -> Self {
        Type::Opaque(name.into())
    }

    pub fn meta(inner: Type) -> Self {
        Type::Meta(Box::new(inner))
    }

    pub fn union(alternatives: impl IntoIterator<Item = Type>) -> Self {
        Type::Union(alternatives.into_iter().collect())
    }

    pub fn int() -> Self {
        Self::opaque("int")
    }

    pub fn uint() -> Self {
        Self::opaque("uint")
    }

    pub fn bool() -> Self {
        Self::opaque("bool")
    }

    pub fn str() -> Self {
        Self::opaque("str")
    }

    /// Vague types accept placeholders when matching.
    pub fn is_vague(&self) -> bool {
        matches!(self, Type::Var(_) | Type::Any)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Type::Unresolved)
    }

    /// Type variables occurring in the type, in order of first appearance.
    pub fn free_vars(&self) -> Vec<TypeVar> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    pub(crate) fn collect_vars(&self, vars: &mut Vec<TypeVar>) {
        match self {
            Type::Var(var) => {
                if !vars.contains(var) {
                    vars.push(var.clone());
                }
            }
            Type::Concrete(_, args) | Type::Union(args) => {
                args.iter().for_each(|arg| arg.collect_vars(vars))
            }
            Type::Meta(inner) => inner.collect_vars(vars),
            Type::Opaque(_) | Type::Any | Type::Unresolved => {}
        }
    }

    /// Replaces bound variables, leaving unbound ones in place.
    pub fn substitute(&self, binding: &Binding) -> Type {
        if binding.is_empty() {
            return self.clone();
        }
        match self {
            Type::Var(var) => binding.get(var).cloned().unwrap_or_else(|| self.clone()),
            Type::Concrete(name, args) => Type::Concrete(
                name.clone(),
                args.iter().map(|arg| arg.substitute(binding)).collect(),
            ),
            Type::Union(alternatives) => Type::Union(
                alternatives
                    .iter()
                    .map(|alternative| alternative.substitute(binding))
                    .collect(),
            ),
            Type::Meta(inner) => Type::meta(inner.substitute(binding)),
            Type::Opaque(_) | Type::Any | Type::Unresolved => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Concrete(name, args) if args.is_empty() => write!(f, "{}", name.name()),
            Type::Concrete(name, args) => write!(f, "{}[{}]", name.name(), args.iter().join(", ")),
            Type::Var(var) => write!(f, "{var}"),
            Type::Opaque(name) => write!(f, "{name}"),
            Type::Meta(inner) => write!(f, "Type[{inner}]"),
            Type::Union(alternatives) => write!(f, "{}", alternatives.iter().join(" | ")),
            Type::Any => write!(f, "Any"),
            Type::Unresolved => write!(f, "?"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("cannot match `{actual}` against `{template}`")]
    Mismatch { template: Type, actual: Type },
    #[error("type variable `{var}` bound to both `{first}` and `{second}`")]
    MergeConflict {
        var: TypeVar,
        first: Type,
        second: Type,
    },
}

/// Assignment of types to type variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    vars: HashMap<TypeVar, Type>,
}

impl Binding {
    pub fn single(var: TypeVar, ty: Type) -> Self {
        Self {
            vars: HashMap::from([(var, ty)]),
        }
    }

    pub fn get(&self, var: &TypeVar) -> Option<&Type> {
        self.vars.get(var)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn vars(&self) -> impl Iterator<Item = &TypeVar> {
        self.vars.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVar, &Type)> {
        self.vars.iter()
    }

    /// Combines two bindings, failing if they disagree on a shared variable.
    pub fn try_merge(&self, other: &Self) -> Result<Self, TypeError> {
        let mut merged = self.clone();
        for (var, ty) in &other.vars {
            match merged.vars.entry(var.clone()) {
                Entry::Occupied(entry) if entry.get() != ty => {
                    return Err(TypeError::MergeConflict {
                        var: var.clone(),
                        first: entry.get().clone(),
                        second: ty.clone(),
                    });
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(entry) => {
                    entry.insert(ty.clone());
                }
            }
        }
        Ok(merged)
    }
}

/// Safe merge of any number of bindings.
pub fn merge_bindings<'b>(
    bindings: impl IntoIterator<Item = &'b Binding>,
) -> Result<Binding, TypeError> {
    bindings
        .into_iter()
        .try_fold(Binding::default(), |merged, binding| merged.try_merge(binding))
}

/// Matches a declared type (possibly containing variables) against an actual type.
///
/// # Arguments
///
/// * `template` - The declared type, e.g. a parameter type
/// * `actual` - The type of the argument
///
/// # Returns
///
/// The binding of the template's variables that makes it accept `actual`.
pub fn match_types(template: &Type, actual: &Type) -> Result<Binding, TypeError> {
    let mismatch = || TypeError::Mismatch {
        template: template.clone(),
        actual: actual.clone(),
    };

    match (template, actual) {
        (Type::Any, _) => Ok(Binding::default()),
        (_, Type::Unresolved) => Err(mismatch()),
        (Type::Var(var), actual) => Ok(match actual {
            Type::Var(other) if other == var => Binding::default(),
            _ => Binding::single(var.clone(), actual.clone()),
        }),
        (Type::Union(alternatives), _) => alternatives
            .iter()
            .find_map(|alternative| match_types(alternative, actual).ok())
            .ok_or_else(mismatch),
        (Type::Meta(inner), Type::Meta(actual_inner)) => match_types(inner, actual_inner),
        (Type::Concrete(name, args), Type::Concrete(actual_name, actual_args))
            if name == actual_name =>
        {
            if args.len() != actual_args.len() {
                return Err(mismatch());
            }
            let bindings = args
                .iter()
                .zip(actual_args)
                .map(|(arg, actual_arg)| match_types(arg, actual_arg))
                .collect::<Result<Vec<_>, _>>()?;
            merge_bindings(&bindings)
        }
        (Type::Opaque(name), Type::Opaque(actual_name)) if name == actual_name => {
            Ok(Binding::default())
        }
        _ => Err(mismatch()),
    }
}
