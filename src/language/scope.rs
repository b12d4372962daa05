//! Lexical scopes of type variables.
//!
//! A rule's type variables are "in scope" while its replacement is being
//! built. Calls constructed inside a scope may keep those variables in their
//! inferred types; outside of every scope a leftover variable is an error.
//! The stack is per thread, which matches how rewriting runs.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::types::TypeVar;

thread_local! {
    static SCOPES: RefCell<Vec<Vec<TypeVar>>> = const { RefCell::new(Vec::new()) };
}

/// An open scope. Dropping the guard closes it, including on early return.
#[must_use = "the scope closes as soon as the guard is dropped"]
pub struct ScopeGuard {
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Adds variables to this scope.
    pub fn extend(&self, vars: impl IntoIterator<Item = TypeVar>) {
        SCOPES.with(|scopes| {
            if let Some(scope) = scopes.borrow_mut().get_mut(self.depth - 1) {
                scope.extend(vars);
            }
        })
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            debug_assert_eq!(scopes.len(), self.depth, "type scopes closed out of order");
            scopes.truncate(self.depth - 1);
        })
    }
}

/// Opens a scope binding `vars`.
pub fn enter(vars: impl IntoIterator<Item = TypeVar>) -> ScopeGuard {
    let vars = vars.into_iter().collect();
    let depth = SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        scopes.push(vars);
        scopes.len()
    });
    ScopeGuard {
        depth,
        _thread_bound: PhantomData,
    }
}

/// Whether `var` is bound by any open scope.
pub fn is_bound(var: &TypeVar) -> bool {
    SCOPES.with(|scopes| scopes.borrow().iter().any(|scope| scope.contains(var)))
}

pub fn depth() -> usize {
    SCOPES.with(|scopes| scopes.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes() {
        let t = TypeVar::fresh("T");
        let u = TypeVar::fresh("U");
        assert!(!is_bound(&t));
        {
            let _outer = enter([t.clone()]);
            assert!(is_bound(&t));
            {
                let _inner = enter([u.clone()]);
                assert!(is_bound(&t) && is_bound(&u));
                assert_eq!(depth(), 2);
            }
            assert!(!is_bound(&u));
        }
        assert!(!is_bound(&t));
        assert_eq!(depth(), 0);
    }

    #[test]
    fn extend_adds_to_open_scope() {
        let t = TypeVar::fresh("T");
        let guard = enter([]);
        assert!(!is_bound(&t));
        guard.extend([t.clone()]);
        assert!(is_bound(&t));
        drop(guard);
        assert!(!is_bound(&t));
    }

    #[test]
    fn closed_on_early_exit() {
        fn bail(t: &TypeVar, fail: bool) -> Result<(), ()> {
            let _scope = enter([t.clone()]);
            if fail {
                return Err(());
            }
            Ok(())
        }
        let t = TypeVar::fresh("T");
        assert!(bail(&t, true).is_err());
        assert!(!is_bound(&t));
    }
}
