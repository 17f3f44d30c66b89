//! Analysis context: symbol tables and the current isolation assumptions
//!
//! Module-level state is looked up here instead of through globals, so one
//! context can be built per program and per inference round.

use super::expr::{BindingFacts, BindingLookup, IsolatedRoot};
use super::mutability::{is_immutable, is_shareable, TypeEnv};
use crate::ast::{BindingDecl, BindingKind, FnDecl, FnId, Name, ObjectDecl, Program};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Constructs currently treated as isolated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assumptions {
    pub functions: BTreeSet<FnId>,
    pub objects: BTreeSet<Name>,
    pub bindings: BTreeSet<Name>,
}

impl Assumptions {
    /// Everything carrying an explicit `isolated` qualifier. Methods of an
    /// isolated object count as declared.
    pub fn declared(ctx: &AnalysisContext) -> Self {
        let functions = ctx
            .functions()
            .filter(|(id, _)| ctx.is_declared_isolated(id))
            .map(|(id, _)| id.clone())
            .collect();
        let objects = ctx
            .objects()
            .filter(|o| o.isolated)
            .map(|o| o.name.clone())
            .collect();
        let bindings = ctx
            .bindings()
            .filter(|b| b.isolated)
            .map(|b| b.name.clone())
            .collect();
        Self {
            functions,
            objects,
            bindings,
        }
    }

    /// Everything isolation may be inferred for.
    pub fn candidates(ctx: &AnalysisContext) -> Self {
        let functions = ctx
            .functions()
            .filter(|(id, decl)| decl.body.is_some() && !ctx.is_declared_isolated(id))
            .map(|(id, _)| id.clone())
            .collect();
        let objects = ctx
            .objects()
            .filter(|o| !o.isolated)
            .map(|o| o.name.clone())
            .collect();
        let bindings = ctx
            .bindings()
            .filter(|b| !b.isolated && !b.public && !(b.is_final && is_immutable(&b.ty, ctx)))
            .map(|b| b.name.clone())
            .collect();
        Self {
            functions,
            objects,
            bindings,
        }
    }

    pub fn union(&self, other: &Assumptions) -> Assumptions {
        Assumptions {
            functions: self.functions.union(&other.functions).cloned().collect(),
            objects: self.objects.union(&other.objects).cloned().collect(),
            bindings: self.bindings.union(&other.bindings).cloned().collect(),
        }
    }

    pub fn intersection(&self, other: &Assumptions) -> Assumptions {
        Assumptions {
            functions: self.functions.intersection(&other.functions).cloned().collect(),
            objects: self.objects.intersection(&other.objects).cloned().collect(),
            bindings: self.bindings.intersection(&other.bindings).cloned().collect(),
        }
    }
}

pub struct AnalysisContext<'p> {
    pub program: &'p Program,
    functions: IndexMap<FnId, &'p FnDecl>,
    objects: IndexMap<Name, &'p ObjectDecl>,
    bindings: IndexMap<Name, &'p BindingDecl>,
    pub assumed: Assumptions,
}

impl<'p> AnalysisContext<'p> {
    pub fn new(program: &'p Program) -> Self {
        let mut functions = IndexMap::new();
        for decl in &program.functions {
            functions.insert(FnId::function(decl.name.clone()), decl);
        }
        let mut objects = IndexMap::new();
        for object in &program.objects {
            objects.insert(object.name.clone(), object);
            for method in &object.methods {
                functions.insert(FnId::method(object.name.clone(), method.name.clone()), method);
            }
        }
        let bindings = program
            .bindings
            .iter()
            .map(|b| (b.name.clone(), b))
            .collect();
        Self {
            program,
            functions,
            objects,
            bindings,
            assumed: Assumptions::default(),
        }
    }

    pub fn with_assumptions(mut self, assumed: Assumptions) -> Self {
        self.assumed = assumed;
        self
    }

    pub fn function(&self, id: &FnId) -> Option<&'p FnDecl> {
        self.functions.get(id).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (&FnId, &'p FnDecl)> + '_ {
        self.functions.iter().map(|(id, decl)| (id, *decl))
    }

    pub fn object(&self, name: &Name) -> Option<&'p ObjectDecl> {
        self.objects.get(name).copied()
    }

    pub fn objects(&self) -> impl Iterator<Item = &'p ObjectDecl> + '_ {
        self.objects.values().copied()
    }

    pub fn binding(&self, name: &Name) -> Option<&'p BindingDecl> {
        self.bindings.get(name).copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &'p BindingDecl> + '_ {
        self.bindings.values().copied()
    }

    /// Declared `isolated` itself, or a method of an object declared
    /// `isolated`.
    pub fn is_declared_isolated(&self, id: &FnId) -> bool {
        let Some(decl) = self.function(id) else {
            return false;
        };
        if decl.isolated {
            return true;
        }
        id.object
            .as_ref()
            .and_then(|o| self.object(o))
            .map(|o| o.isolated)
            .unwrap_or(false)
    }

    pub fn fn_is_isolated(&self, id: &FnId) -> bool {
        self.assumed.functions.contains(id)
    }

    pub fn object_is_isolated(&self, name: &Name) -> bool {
        self.assumed.objects.contains(name)
    }

    /// The module-level binding is an isolation root: isolated (declared or
    /// assumed) and not shareable as it stands.
    pub fn binding_root(&self, name: &Name) -> Option<IsolatedRoot> {
        let binding = self.binding(name)?;
        if !self.assumed.bindings.contains(name) {
            return None;
        }
        if binding.is_final && is_shareable(&binding.ty, self) {
            return None;
        }
        Some(IsolatedRoot::Binding(name.clone()))
    }

    /// The root carries an explicit `isolated` qualifier.
    pub fn root_is_declared(&self, root: &IsolatedRoot) -> bool {
        match root {
            IsolatedRoot::Binding(name) => self.binding(name).map(|b| b.isolated).unwrap_or(false),
            IsolatedRoot::SelfFields(object) => {
                self.object(object).map(|o| o.isolated).unwrap_or(false)
            }
        }
    }
}

impl TypeEnv for AnalysisContext<'_> {
    fn is_readonly_object(&self, name: &Name) -> bool {
        self.object(name).map(|o| o.readonly).unwrap_or(false)
    }

    fn is_isolated_object(&self, name: &Name) -> bool {
        self.object_is_isolated(name)
    }
}

/// Module scope: only module-level bindings are visible, no region is open.
impl BindingLookup for AnalysisContext<'_> {
    fn lookup(&self, name: &Name) -> Option<BindingFacts> {
        let binding = self.binding(name)?;
        Some(BindingFacts {
            kind: BindingKind::ModuleLevel,
            ty: binding.ty.clone(),
            is_final: binding.is_final,
            root: self.binding_root(name),
            outside_region: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{FieldDecl, Type};

    fn program() -> Program {
        Program::new("ctx")
            .with_binding(BindingDecl::new("count", Type::Int, int(0)).isolated())
            .with_binding(BindingDecl::new("limit", Type::Int, int(10)).final_())
            .with_binding(BindingDecl::new("cache", Type::map(Type::Str), list(vec![])).public())
            .with_binding(BindingDecl::new("items", Type::array(Type::Int), list(vec![])))
            .with_function(FnDecl::new("f", vec![]).isolated())
            .with_function(FnDecl::new("g", vec![]))
            .with_function(FnDecl::external("io"))
            .with_object(
                ObjectDecl::new("Counter")
                    .isolated()
                    .field(FieldDecl::new("n", Type::Int).private())
                    .method(FnDecl::new("inc", vec![])),
            )
    }

    #[test]
    fn test_declared_assumptions() {
        let program = program();
        let ctx = AnalysisContext::new(&program);
        let declared = Assumptions::declared(&ctx);
        assert!(declared.functions.contains(&FnId::function("f")));
        assert!(declared.functions.contains(&FnId::method("Counter", "inc")));
        assert!(!declared.functions.contains(&FnId::function("g")));
        assert!(declared.objects.contains("Counter"));
        assert!(declared.bindings.contains("count"));
    }

    #[test]
    fn test_candidates_skip_public_and_immutable_bindings() {
        let program = program();
        let ctx = AnalysisContext::new(&program);
        let candidates = Assumptions::candidates(&ctx);
        assert_eq!(
            candidates.bindings.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            vec!["items"]
        );
        assert!(candidates.functions.contains(&FnId::function("g")));
        assert!(!candidates.functions.contains(&FnId::function("io")));
    }

    #[test]
    fn test_binding_root_follows_assumptions() {
        let program = program();
        let ctx = AnalysisContext::new(&program);
        assert_eq!(ctx.binding_root(&"count".into()), None);
        let ctx = ctx.with_assumptions(Assumptions::declared(&AnalysisContext::new(&program)));
        assert_eq!(
            ctx.binding_root(&"count".into()),
            Some(IsolatedRoot::Binding("count".into()))
        );
        assert!(ctx.root_is_declared(&IsolatedRoot::Binding("count".into())));
        assert!(ctx.root_is_declared(&IsolatedRoot::SelfFields("Counter".into())));
    }
}
