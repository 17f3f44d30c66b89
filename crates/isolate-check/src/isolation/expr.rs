//! Isolated-expression evaluation
//!
//! An isolated expression is statically guaranteed to evaluate to a fresh,
//! unaliased value whose mutable state is reachable only through the result.
//! The rules, in priority order:
//!
//! 1. the static type is immutable, or an isolated object type;
//! 2. `clone()` / `cloneReadOnly()` of anything;
//! 3. a constructor whose every member is isolated;
//! 4. a reference to an isolated variable declared outside the current lock
//!    region, when nested inside another isolating form (never bare); the
//!    variable the region restricts is exempt from this rule;
//! 5. nothing else.
//!
//! The result depends on the surrounding region, so it is recomputed per
//! occurrence and never cached on the node.

use super::mutability::{is_immutable, is_isolated_object_type, TypeEnv};
use crate::ast::{BindingKind, Expr, ExprKind, Name, Type};
use std::fmt;

/// State a lock region can restrict: an isolated module-level variable, or
/// the mutable fields of the object instance bound to `self`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IsolatedRoot {
    Binding(Name),
    SelfFields(Name),
}

impl fmt::Display for IsolatedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolatedRoot::Binding(name) => write!(f, "`{}`", name),
            IsolatedRoot::SelfFields(object) => write!(f, "`self` of `{}`", object),
        }
    }
}

/// What the evaluator needs to know about a name at a given point.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingFacts {
    pub kind: BindingKind,
    pub ty: Type,
    pub is_final: bool,
    /// Set when the binding is isolated, declared or inferred.
    pub root: Option<IsolatedRoot>,
    /// Declared outside the innermost lock region. Always true when no region
    /// is open.
    pub outside_region: bool,
}

/// Name resolution seam between the evaluator and whoever walks the code.
pub trait BindingLookup: TypeEnv {
    fn lookup(&self, name: &Name) -> Option<BindingFacts>;
}

pub struct IsolatedExprEvaluator<'a, L: BindingLookup + ?Sized> {
    lookup: &'a L,
    restricted: Option<&'a IsolatedRoot>,
}

impl<'a, L: BindingLookup + ?Sized> IsolatedExprEvaluator<'a, L> {
    pub fn new(lookup: &'a L, restricted: Option<&'a IsolatedRoot>) -> Self {
        Self { lookup, restricted }
    }

    pub fn is_isolated(&self, expr: &Expr) -> bool {
        self.eval(expr, false)
    }

    /// Innermost sub-expression that makes `expr` non-isolated, or `None` if
    /// it is isolated.
    pub fn first_offender<'e>(&self, expr: &'e Expr) -> Option<&'e Expr> {
        self.offender(expr, false)
    }

    fn eval(&self, expr: &Expr, nested: bool) -> bool {
        if is_immutable(&expr.ty, self.lookup) || is_isolated_object_type(&expr.ty, self.lookup) {
            return true;
        }
        match &expr.kind {
            ExprKind::Clone { .. } | ExprKind::CloneReadonly { .. } => true,
            ExprKind::Construct { elems } => elems.iter().all(|e| self.eval(e, true)),
            ExprKind::Var { name } => self.var_is_isolated(name, nested),
            _ => false,
        }
    }

    fn var_is_isolated(&self, name: &Name, nested: bool) -> bool {
        let Some(facts) = self.lookup.lookup(name) else {
            return false;
        };
        let Some(root) = facts.root.as_ref() else {
            return false;
        };
        if self.restricted == Some(root) {
            return false;
        }
        facts.outside_region && nested
    }

    fn offender<'e>(&self, expr: &'e Expr, nested: bool) -> Option<&'e Expr> {
        if self.eval(expr, nested) {
            return None;
        }
        match &expr.kind {
            ExprKind::Construct { elems } => elems
                .iter()
                .find_map(|e| self.offender(e, true))
                .or(Some(expr)),
            _ => Some(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Scope {
        bindings: HashMap<Name, BindingFacts>,
    }

    impl Scope {
        fn with(mut self, name: &str, ty: Type, root: bool, outside_region: bool) -> Self {
            self.bindings.insert(
                name.into(),
                BindingFacts {
                    kind: BindingKind::ModuleLevel,
                    ty,
                    is_final: false,
                    root: root.then(|| IsolatedRoot::Binding(name.into())),
                    outside_region,
                },
            );
            self
        }
    }

    impl TypeEnv for Scope {
        fn is_readonly_object(&self, _name: &Name) -> bool {
            false
        }

        fn is_isolated_object(&self, name: &Name) -> bool {
            name.as_str() == "Counter"
        }
    }

    impl BindingLookup for Scope {
        fn lookup(&self, name: &Name) -> Option<BindingFacts> {
            self.bindings.get(name).cloned()
        }
    }

    fn ints() -> Type {
        Type::array(Type::Int)
    }

    #[test]
    fn test_immutable_type_is_isolated_regardless_of_shape() {
        let scope = Scope::default().with("a", ints(), false, true);
        let eval = IsolatedExprEvaluator::new(&scope, None);
        let frozen = index(var("a", Type::readonly(ints())), 0);
        assert!(eval.is_isolated(&frozen));
        assert!(eval.is_isolated(&call("f", vec![var("a", ints())], Type::Str)));
    }

    #[test]
    fn test_isolated_object_type_is_isolated() {
        let scope = Scope::default();
        let eval = IsolatedExprEvaluator::new(&scope, None);
        assert!(eval.is_isolated(&var("c", Type::object("Counter"))));
        assert!(!eval.is_isolated(&var("c", Type::object("Cache"))));
    }

    #[test]
    fn test_clone_is_always_isolated() {
        let scope = Scope::default().with("a", ints(), false, true);
        let eval = IsolatedExprEvaluator::new(&scope, None);
        assert!(eval.is_isolated(&clone(var("a", ints()))));
        assert!(eval.is_isolated(&clone_readonly(var("a", ints()))));
    }

    #[test]
    fn test_constructor_depends_on_members() {
        let scope = Scope::default().with("a", ints(), false, true);
        let eval = IsolatedExprEvaluator::new(&scope, None);
        let good = list(vec![list(vec![int(1), int(3)]), clone(var("a", ints()))]);
        let bad = list(vec![list(vec![int(1), int(3)]), var("a", ints())]);
        assert!(eval.is_isolated(&good));
        assert!(!eval.is_isolated(&bad));
    }

    #[test]
    fn test_isolated_variable_only_counts_when_nested() {
        let scope = Scope::default().with("iso", ints(), true, true);
        let eval = IsolatedExprEvaluator::new(&scope, None);
        assert!(!eval.is_isolated(&var("iso", ints())));
        assert!(eval.is_isolated(&list_of(vec![var("iso", ints())], Type::array(ints()))));
    }

    #[test]
    fn test_restricted_variable_is_exempt() {
        let scope = Scope::default().with("b", ints(), true, true);
        let root = IsolatedRoot::Binding("b".into());
        let eval = IsolatedExprEvaluator::new(&scope, Some(&root));
        assert!(!eval.is_isolated(&list_of(vec![var("b", ints())], Type::array(ints()))));
        assert!(eval.is_isolated(&clone(var("b", ints()))));
    }

    #[test]
    fn test_first_offender_points_at_the_aliased_member() {
        let scope = Scope::default().with("a", ints(), false, true);
        let eval = IsolatedExprEvaluator::new(&scope, None);
        let init = list(vec![list(vec![int(1), int(3)]), var("a", ints()), list(vec![int(4)])]);
        let offender = eval.first_offender(&init).expect("not isolated");
        assert_eq!(offender.as_var().map(|n| n.as_str()), Some("a"));
        assert!(eval.first_offender(&clone(init)).is_none());
    }
}
