//! Function and method bodies
//!
//! [`FnChecker`] walks one body against the current assumptions and records
//! every isolation issue it finds, together with the callees and the
//! module-level bindings it touches. Whether the issues turn into errors or
//! hints is decided by the classifier.

use super::context::AnalysisContext;
use super::expr::{BindingFacts, BindingLookup, IsolatedExprEvaluator, IsolatedRoot};
use super::lock::{self, LockRegion};
use super::mutability::{is_mutable_field, is_shareable, TypeEnv};
use super::{BindingAccess, Issue};
use crate::ast::{
    BindingDecl, BindingKind, Callee, Expr, ExprKind, FnDecl, FnId, Name, ObjectDecl, Stmt,
    StmtKind, Type,
};
use crate::error::Violation;
use crate::pos::Pos;
use log::trace;
use std::collections::BTreeSet;

const SELF: &str = "self";

/// Everything learned from one body.
#[derive(Debug, Clone, Default)]
pub struct FnOutcome {
    pub issues: Vec<Issue>,
    pub callees: BTreeSet<FnId>,
    pub accesses: Vec<BindingAccess>,
}

impl FnOutcome {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Local {
    name: Name,
    ty: Type,
    is_final: bool,
    kind: BindingKind,
    /// Number of lock regions open at the declaration.
    region_depth: usize,
    /// Concurrent unit (function body or worker) that declared it.
    unit: usize,
}

enum Resolved<'p> {
    Local(Local),
    Module(&'p BindingDecl),
    Unknown,
}

pub struct FnChecker<'c, 'p> {
    ctx: &'c AnalysisContext<'p>,
    id: FnId,
    object: Option<&'p ObjectDecl>,
    scopes: Vec<Vec<Local>>,
    regions: Vec<LockRegion>,
    units: Vec<usize>,
    next_unit: usize,
    next_region: usize,
    outcome: FnOutcome,
}

impl<'c, 'p> FnChecker<'c, 'p> {
    pub fn new(ctx: &'c AnalysisContext<'p>, id: FnId) -> Self {
        let object = id.object.as_ref().and_then(|o| ctx.object(o));
        Self {
            ctx,
            id,
            object,
            scopes: Vec::new(),
            regions: Vec::new(),
            units: vec![0],
            next_unit: 0,
            next_region: 0,
            outcome: FnOutcome::default(),
        }
    }

    pub fn check(mut self, decl: &FnDecl) -> FnOutcome {
        trace!("checking body of {}", self.id);
        self.scopes.push(Vec::new());
        if let Some(object) = self.object {
            self.declare(SELF.into(), Type::Object(object.name.clone()), true, BindingKind::Parameter);
        }
        for param in &decl.params {
            self.declare(param.name.clone(), param.ty.clone(), true, BindingKind::Parameter);
        }
        if let Some(body) = &decl.body {
            for stmt in body {
                self.walk_stmt(stmt);
            }
        }
        self.scopes.pop();
        self.outcome
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    fn declare(&mut self, name: Name, ty: Type, is_final: bool, kind: BindingKind) {
        let local = Local {
            name,
            ty,
            is_final,
            kind,
            region_depth: self.regions.len(),
            unit: self.current_unit(),
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(local);
        }
    }

    fn resolve(&self, name: &Name) -> Resolved<'p> {
        let local = self
            .scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|l| &l.name == name);
        if let Some(local) = local {
            return Resolved::Local(local.clone());
        }
        match self.ctx.binding(name) {
            Some(binding) => Resolved::Module(binding),
            None => Resolved::Unknown,
        }
    }

    fn walk_block(&mut self, body: &[Stmt]) {
        self.scopes.push(Vec::new());
        for stmt in body {
            self.walk_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn current_unit(&self) -> usize {
        self.units.last().copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    fn restricted(&self) -> Option<&IsolatedRoot> {
        self.regions.last().and_then(|r| r.restricted())
    }

    fn holds(&self, root: &IsolatedRoot) -> bool {
        self.regions.iter().any(|r| r.holds(root))
    }

    /// The innermost region restricts state declared `isolated`.
    fn region_pinned(&self) -> bool {
        self.restricted()
            .map(|root| self.ctx.root_is_declared(root))
            .unwrap_or(false)
    }

    fn is_outside_region(&self, local: &Local) -> bool {
        local.region_depth < self.regions.len()
    }

    /// The isolated root an expression names directly, if any.
    fn root_of(&self, expr: &Expr) -> Option<IsolatedRoot> {
        match &expr.kind {
            ExprKind::Var { name } => match self.resolve(name) {
                Resolved::Module(binding) => self.ctx.binding_root(&binding.name),
                _ => None,
            },
            ExprKind::Field { base, name } => self.self_field_root(base, name),
            _ => None,
        }
    }

    /// `self.<field>` of an isolated object, for a mutable field.
    fn self_field_root(&self, base: &Expr, field: &Name) -> Option<IsolatedRoot> {
        let object = self.object?;
        if base.as_var()?.as_str() != SELF {
            return None;
        }
        if !matches!(self.resolve(&SELF.into()), Resolved::Local(l) if l.kind == BindingKind::Parameter) {
            return None;
        }
        let decl = object.get_field(field)?;
        if !self.ctx.object_is_isolated(&object.name) || !is_mutable_field(decl, self.ctx) {
            return None;
        }
        Some(IsolatedRoot::SelfFields(object.name.clone()))
    }

    fn raise(&mut self, violation: Violation, pos: Pos, pinned: bool) {
        trace!("{}: {} ({})", self.id, violation, violation.rule());
        self.outcome.issues.push(Issue::new(violation, pos).pinned(pinned));
    }

    fn expr_is_isolated(&self, expr: &Expr) -> bool {
        IsolatedExprEvaluator::new(self, self.restricted()).is_isolated(expr)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let {
                name,
                ty,
                init,
                is_final,
            } => {
                self.walk_expr(init, false);
                self.declare(name.clone(), ty.clone(), *is_final, BindingKind::Local);
            }
            StmtKind::Assign { target, value } => self.walk_assign(target, value),
            StmtKind::Expr { expr } => self.walk_expr(expr, false),
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.transfer_out(value);
                    self.walk_expr(value, false);
                }
            }
            StmtKind::Lock { body } => self.walk_lock(body, stmt.pos),
            StmtKind::Worker { name, body } => {
                self.next_unit += 1;
                trace!("{}: worker `{}` is unit {}", self.id, name, self.next_unit);
                self.units.push(self.next_unit);
                // a worker runs outside any lock held where it is started
                let regions = std::mem::take(&mut self.regions);
                self.walk_block(body);
                self.regions = regions;
                self.units.pop();
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.walk_expr(cond, false);
                self.walk_block(then);
                self.walk_block(otherwise);
            }
            StmtKind::While { cond, body } => {
                self.walk_expr(cond, false);
                self.walk_block(body);
            }
            StmtKind::Block { body } => self.walk_block(body),
        }
    }

    fn walk_assign(&mut self, target: &Expr, value: &Expr) {
        match target.as_var() {
            Some(name) => {
                if self.stores_outside_region(target, name) {
                    self.transfer_out(value);
                }
                self.visit_name(name, target.pos, true, true);
            }
            None => self.walk_expr(target, false),
        }
        self.walk_expr(value, false);
    }

    /// Assigning to `name` moves a value out of the innermost restricting
    /// region. Writes to the restricted root itself stay inside.
    fn stores_outside_region(&self, target: &Expr, name: &Name) -> bool {
        let Some(restricted) = self.restricted() else {
            return false;
        };
        let outside = match self.resolve(name) {
            Resolved::Local(local) => self.is_outside_region(&local),
            Resolved::Module(_) => true,
            Resolved::Unknown => false,
        };
        outside && self.root_of(target).as_ref() != Some(restricted)
    }

    fn transfer_out(&mut self, value: &Expr) {
        let Some(root) = self.restricted() else {
            return;
        };
        if let Some(violation) = lock::check_transfer_out(root, value, self) {
            let pinned = self.region_pinned();
            self.raise(violation, value.pos, pinned);
        }
    }

    fn walk_lock(&mut self, body: &[Stmt], pos: Pos) {
        let uses = lock::collect_roots(body, &|e: &Expr| self.root_of(e));
        let mut region = LockRegion::new(self.next_region, pos, self.id.clone());
        self.next_region += 1;
        if let Some(violation) = region.begin(uses) {
            let pinned = region.held().iter().any(|r| self.ctx.root_is_declared(r));
            self.raise(violation, pos, pinned);
        }
        if let Some(root) = region.restricted() {
            if self.holds(root) {
                let violation = Violation::ReentrantLock {
                    root: root.to_string(),
                    span: pos.span(),
                };
                let pinned = self.ctx.root_is_declared(root);
                self.raise(violation, pos, pinned);
            }
        }
        self.regions.push(region);
        self.walk_block(body);
        if let Some(mut region) = self.regions.pop() {
            region.close();
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `covered` is set below an isolating form (a clone, or a constructor
    /// whose members are all isolated); outer variables used there cannot leak
    /// into the region. An immutable result type alone covers nothing, and
    /// call arguments are always checked on their own.
    fn walk_expr(&mut self, expr: &Expr, covered: bool) {
        let covered = covered
            || (self.restricted().is_some() && is_isolating_form(expr) && self.expr_is_isolated(expr));
        match &expr.kind {
            ExprKind::Literal { .. } => {}
            ExprKind::Var { name } => self.visit_name(name, expr.pos, covered, false),
            ExprKind::Field { base, name } => match self.self_field_root(base, name) {
                Some(root) => self.visit_root(root, expr.pos),
                None => self.walk_expr(base, covered),
            },
            ExprKind::Call { callee, args } => {
                self.visit_call(callee, expr.pos);
                for arg in args {
                    self.walk_expr(arg, false);
                }
            }
            ExprKind::Start { callee, args } => {
                self.visit_call(callee, expr.pos);
                for arg in args {
                    if !self.expr_is_isolated(arg) {
                        let violation = Violation::InvalidCaptureInConcurrentUnit {
                            name: arg.to_string(),
                            reason: "arguments of `start` must be isolated expressions".into(),
                            span: arg.pos.span(),
                        };
                        self.raise(violation, arg.pos, false);
                    }
                    self.walk_expr(arg, false);
                }
            }
            _ => {
                for child in expr.children() {
                    self.walk_expr(child, covered);
                }
            }
        }
    }

    fn visit_name(&mut self, name: &Name, pos: Pos, covered: bool, write: bool) {
        match self.resolve(name) {
            Resolved::Local(local) => {
                let shareable = is_shareable(&local.ty, self.ctx);
                if local.unit != self.current_unit() && !(local.is_final && shareable) {
                    let violation = Violation::InvalidCaptureInConcurrentUnit {
                        name: name.to_string(),
                        reason: "variables captured by a worker must be final and immutable, \
                                 or of an isolated object type"
                            .into(),
                        span: pos.span(),
                    };
                    self.raise(violation, pos, false);
                }
                if write || covered || shareable || !self.is_outside_region(&local) {
                    return;
                }
                if let Some(root) = self.restricted() {
                    let violation = lock::transfer_in_violation(name, root, pos);
                    let pinned = self.region_pinned();
                    self.raise(violation, pos, pinned);
                }
            }
            Resolved::Module(binding) => self.visit_module_binding(binding, pos),
            Resolved::Unknown => trace!("{}: unresolved name `{}`", self.id, name),
        }
    }

    fn visit_module_binding(&mut self, binding: &BindingDecl, pos: Pos) {
        if binding.is_final && is_shareable(&binding.ty, self.ctx) {
            return;
        }
        match self.ctx.binding_root(&binding.name) {
            Some(root) => {
                let locked = self.holds(&root);
                self.outcome.accesses.push(BindingAccess {
                    name: binding.name.clone(),
                    locked,
                });
                if !locked {
                    let violation = Violation::InvalidLockStatementVariableUsage {
                        root: root.to_string(),
                        span: pos.span(),
                    };
                    self.raise(violation, pos, binding.isolated);
                }
            }
            None => {
                self.outcome.accesses.push(BindingAccess {
                    name: binding.name.clone(),
                    locked: false,
                });
                let violation = Violation::NonIsolatedStateAccess {
                    name: binding.name.to_string(),
                    span: pos.span(),
                };
                self.raise(violation, pos, false);
            }
        }
    }

    fn visit_root(&mut self, root: IsolatedRoot, pos: Pos) {
        if self.holds(&root) {
            return;
        }
        let pinned = self.ctx.root_is_declared(&root);
        let violation = Violation::InvalidLockStatementVariableUsage {
            root: root.to_string(),
            span: pos.span(),
        };
        self.raise(violation, pos, pinned);
    }

    fn visit_call(&mut self, callee: &Callee, pos: Pos) {
        let id = FnId::from(callee);
        self.outcome.callees.insert(id.clone());
        if self.ctx.fn_is_isolated(&id) {
            return;
        }
        let violation = Violation::NonIsolatedCall {
            callee: id.to_string(),
            span: pos.span(),
        };
        let pinned = self.region_pinned();
        self.raise(violation, pos, pinned);
    }
}

fn is_isolating_form(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Clone { .. } | ExprKind::CloneReadonly { .. } | ExprKind::Construct { .. }
    )
}

impl TypeEnv for FnChecker<'_, '_> {
    fn is_readonly_object(&self, name: &Name) -> bool {
        self.ctx.is_readonly_object(name)
    }

    fn is_isolated_object(&self, name: &Name) -> bool {
        self.ctx.is_isolated_object(name)
    }
}

impl BindingLookup for FnChecker<'_, '_> {
    fn lookup(&self, name: &Name) -> Option<BindingFacts> {
        match self.resolve(name) {
            Resolved::Local(local) => Some(BindingFacts {
                kind: local.kind,
                outside_region: self.regions.is_empty() || self.is_outside_region(&local),
                ty: local.ty,
                is_final: local.is_final,
                root: None,
            }),
            Resolved::Module(binding) => Some(BindingFacts {
                kind: BindingKind::ModuleLevel,
                ty: binding.ty.clone(),
                is_final: binding.is_final,
                root: self.ctx.binding_root(&binding.name),
                outside_region: true,
            }),
            Resolved::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{FieldDecl, Program};
    use crate::error::RuleCode;
    use crate::isolation::Assumptions;

    fn ints() -> Type {
        Type::array(Type::Int)
    }

    fn run(program: &Program, id: FnId) -> FnOutcome {
        let ctx = AnalysisContext::new(program);
        let assumed = Assumptions::declared(&ctx);
        let ctx = ctx.with_assumptions(assumed);
        let decl = ctx.function(&id).expect("function");
        FnChecker::new(&ctx, id).check(decl)
    }

    fn rules(outcome: &FnOutcome) -> Vec<RuleCode> {
        outcome.issues.iter().map(|i| i.violation.rule()).collect()
    }

    fn with_counter(f: FnDecl) -> Program {
        Program::new("t")
            .with_binding(BindingDecl::new("counter", ints(), list(vec![])).isolated())
            .with_binding(BindingDecl::new("plain", ints(), list(vec![])).public())
            .with_function(f)
    }

    #[test]
    fn test_locked_access_is_clean() {
        let f = FnDecl::new(
            "bump",
            vec![lock(vec![assign(index(var("counter", ints()), 0), int(1))])],
        );
        let outcome = run(&with_counter(f), FnId::function("bump"));
        assert!(outcome.is_clean(), "{:?}", outcome.issues);
        assert_eq!(
            outcome.accesses,
            vec![BindingAccess {
                name: "counter".into(),
                locked: true
            }]
        );
    }

    #[test]
    fn test_unlocked_access_is_pinned() {
        let f = FnDecl::new("peek", vec![ret(index(var("counter", ints()), 0))]);
        let outcome = run(&with_counter(f), FnId::function("peek"));
        assert_eq!(rules(&outcome), vec![RuleCode::InvalidLockStatementVariableUsage]);
        assert!(outcome.issues[0].pinned);
    }

    #[test]
    fn test_plain_module_state_is_not_isolated_state() {
        let f = FnDecl::new("touch", vec![expr(var("plain", ints()))]);
        let outcome = run(&with_counter(f), FnId::function("touch"));
        assert_eq!(rules(&outcome), vec![RuleCode::NonIsolatedStateAccess]);
        assert!(!outcome.issues[0].pinned);
    }

    #[test]
    fn test_transfer_in_of_mutable_parameter() {
        let f = FnDecl::new(
            "store",
            vec![lock(vec![assign(
                var("counter", ints()),
                var("values", ints()),
            )])],
        )
        .param("values", ints());
        let outcome = run(&with_counter(f), FnId::function("store"));
        assert_eq!(rules(&outcome), vec![RuleCode::NonIsolatedTransferIn]);

        let f = FnDecl::new(
            "store",
            vec![lock(vec![assign(
                var("counter", ints()),
                clone(var("values", ints())),
            )])],
        )
        .param("values", ints());
        assert!(run(&with_counter(f), FnId::function("store")).is_clean());
    }

    #[test]
    fn test_transfer_out_through_outer_local() {
        let f = FnDecl::new(
            "leak",
            vec![
                let_("out", list_of(vec![], ints())),
                lock(vec![assign(var("out", ints()), var("counter", ints()))]),
            ],
        );
        let outcome = run(&with_counter(f), FnId::function("leak"));
        assert_eq!(rules(&outcome), vec![RuleCode::NonIsolatedTransferOut]);
        assert!(outcome.issues[0].pinned);
    }

    #[test]
    fn test_immutable_outer_values_flow_in_freely() {
        let f = FnDecl::new(
            "set",
            vec![lock(vec![assign(index(var("counter", ints()), 0), var("n", Type::Int))])],
        )
        .param("n", Type::Int);
        assert!(run(&with_counter(f), FnId::function("set")).is_clean());
    }

    #[test]
    fn test_reentrant_lock() {
        let inner = lock(vec![assign(index(var("counter", ints()), 0), int(2))]);
        let f = FnDecl::new(
            "twice",
            vec![lock(vec![
                assign(index(var("counter", ints()), 0), int(1)),
                inner,
            ])],
        );
        let outcome = run(&with_counter(f), FnId::function("twice"));
        assert_eq!(rules(&outcome), vec![RuleCode::ReentrantLock]);
    }

    #[test]
    fn test_worker_captures() {
        let f = FnDecl::new(
            "spawn",
            vec![
                let_("mutable", list(vec![int(1)])),
                final_("frozen", int(2)),
                worker(
                    "w",
                    vec![expr(var("mutable", ints())), expr(var("frozen", Type::Int))],
                ),
            ],
        );
        let outcome = run(&with_counter(f), FnId::function("spawn"));
        assert_eq!(rules(&outcome), vec![RuleCode::InvalidCaptureInConcurrentUnit]);
    }

    #[test]
    fn test_start_arguments_must_be_isolated() {
        let program = with_counter(
            FnDecl::new(
                "go",
                vec![
                    expr(start("work", vec![var("xs", ints())], Type::Nil)),
                    expr(start("work", vec![clone(var("xs", ints()))], Type::Nil)),
                ],
            )
            .param("xs", ints()),
        )
        .with_function(FnDecl::new("work", vec![]).isolated().param("xs", ints()));
        let outcome = run(&program, FnId::function("go"));
        assert_eq!(rules(&outcome), vec![RuleCode::InvalidCaptureInConcurrentUnit]);
        assert!(outcome.callees.contains(&FnId::function("work")));
    }

    #[test]
    fn test_self_fields_need_a_lock() {
        let items = || self_field("Stack", "items", ints());
        let object = ObjectDecl::new("Stack")
            .isolated()
            .field(FieldDecl::new("items", ints()).private())
            .method(FnDecl::new("peek", vec![ret(clone(items()))]))
            .method(FnDecl::new("safe_peek", vec![lock(vec![ret(clone(items()))])]))
            .method(FnDecl::new("leak", vec![lock(vec![ret(items())])]));
        let program = Program::new("t").with_object(object);
        assert_eq!(
            rules(&run(&program, FnId::method("Stack", "peek"))),
            vec![RuleCode::InvalidLockStatementVariableUsage]
        );
        assert!(run(&program, FnId::method("Stack", "safe_peek")).is_clean());
        assert_eq!(
            rules(&run(&program, FnId::method("Stack", "leak"))),
            vec![RuleCode::NonIsolatedTransferOut]
        );
    }
}
