//! Lock regions
//!
//! A region goes `Open -> Analyzing -> Closed`. On entry its body is scanned
//! for the isolated roots it touches; at most one may be touched and that one
//! becomes the *restricted* root. Values crossing the region boundary are then
//! checked against the restricted root:
//!
//! - transfer in: a mutable variable declared outside the region may only be
//!   used through an isolated expression;
//! - transfer out: a returned value, or a value stored into a variable
//!   declared outside the region, must be an isolated expression.
//!
//! A region touching no root restricts nothing and imposes no transfer rules.

use super::expr::{BindingLookup, IsolatedExprEvaluator, IsolatedRoot};
use crate::ast::{Expr, ExprKind, FnId, Name, Stmt, StmtKind};
use crate::error::Violation;
use crate::pos::Pos;
use log::trace;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Open,
    Analyzing,
    Closed,
}

/// Direction in which a value crosses a region boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransferKind {
    In,
    Out,
}

/// An occurrence of an isolated root inside a region body.
#[derive(Debug, Clone, PartialEq)]
pub struct RootUse {
    pub root: IsolatedRoot,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct LockRegion {
    pub id: usize,
    pub pos: Pos,
    pub enclosing: FnId,
    state: RegionState,
    held: Vec<IsolatedRoot>,
    restricted: Option<IsolatedRoot>,
}

impl LockRegion {
    pub fn new(id: usize, pos: Pos, enclosing: FnId) -> Self {
        Self {
            id,
            pos,
            enclosing,
            state: RegionState::Open,
            held: Vec::new(),
            restricted: None,
        }
    }

    pub fn state(&self) -> RegionState {
        self.state
    }

    /// The single isolated root this region protects, if any.
    pub fn restricted(&self) -> Option<&IsolatedRoot> {
        self.restricted.as_ref()
    }

    /// Every root touched by the body. More than one only after a
    /// `MultipleRestrictedVariables` violation; accesses to them are then not
    /// reported again.
    pub fn holds(&self, root: &IsolatedRoot) -> bool {
        self.held.contains(root)
    }

    pub fn held(&self) -> &[IsolatedRoot] {
        &self.held
    }

    /// Determine the restricted root from the roots used in the body and move
    /// to `Analyzing`.
    ///
    /// A body touching no root is accepted as a plain lock: it restricts
    /// nothing, so no transfer can alias isolated state through it.
    pub fn begin(&mut self, uses: Vec<RootUse>) -> Option<Violation> {
        debug_assert_eq!(self.state, RegionState::Open);
        for used in uses {
            if !self.held.contains(&used.root) {
                self.held.push(used.root);
            }
        }
        self.state = RegionState::Analyzing;
        trace!(
            "lock #{} in {}: open -> analyzing, roots [{}]",
            self.id,
            self.enclosing,
            self.held
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        match self.held.as_slice() {
            [] => None,
            [only] => {
                self.restricted = Some(only.clone());
                None
            }
            [first, second, ..] => Some(Violation::MultipleRestrictedVariables {
                first: first.to_string(),
                second: second.to_string(),
                span: self.pos.span(),
            }),
        }
    }

    pub fn close(&mut self) {
        debug_assert_eq!(self.state, RegionState::Analyzing);
        self.state = RegionState::Closed;
        trace!("lock #{} in {}: analyzing -> closed", self.id, self.enclosing);
    }
}

/// Collect the isolated roots a lock body touches. Bodies of nested locks are
/// skipped, they restrict on their own, and so are worker bodies, which run
/// outside the region. Names declared inside the body shadow
/// module-level ones.
pub fn collect_roots<F>(body: &[Stmt], resolve: &F) -> Vec<RootUse>
where
    F: Fn(&Expr) -> Option<IsolatedRoot>,
{
    let mut collector = RootCollector {
        resolve,
        shadowed: HashSet::new(),
        uses: Vec::new(),
    };
    collector.stmts(body);
    collector.uses
}

struct RootCollector<'f, F> {
    resolve: &'f F,
    shadowed: HashSet<Name>,
    uses: Vec<RootUse>,
}

impl<F> RootCollector<'_, F>
where
    F: Fn(&Expr) -> Option<IsolatedRoot>,
{
    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, init, .. } => {
                self.expr(init);
                self.shadowed.insert(name.clone());
            }
            StmtKind::Assign { target, value } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::Expr { expr } => self.expr(expr),
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Lock { .. } | StmtKind::Worker { .. } => {}
            StmtKind::Block { body } => self.stmts(body),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.stmts(then);
                self.stmts(otherwise);
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.stmts(body);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Var { name } if self.shadowed.contains(name) => {}
            ExprKind::Var { .. } | ExprKind::Field { .. } => {
                if let Some(root) = (self.resolve)(expr) {
                    self.uses.push(RootUse {
                        root,
                        pos: expr.pos,
                    });
                    return;
                }
                for child in expr.children() {
                    self.expr(child);
                }
            }
            _ => {
                for child in expr.children() {
                    self.expr(child);
                }
            }
        }
    }
}

/// Check a value leaving a region that restricts `root`.
pub fn check_transfer_out<L>(root: &IsolatedRoot, value: &Expr, lookup: &L) -> Option<Violation>
where
    L: BindingLookup + ?Sized,
{
    let evaluator = IsolatedExprEvaluator::new(lookup, Some(root));
    let offender = evaluator.first_offender(value)?;
    trace!("transfer {} of `{}` rejected at `{}`", TransferKind::Out, value, offender);
    Some(Violation::NonIsolatedTransferOut {
        root: root.to_string(),
        span: offender.pos.span(),
    })
}

/// Violation for a mutable outer variable used inside a region that restricts
/// `root`, outside any isolated expression.
pub fn transfer_in_violation(name: &Name, root: &IsolatedRoot, pos: Pos) -> Violation {
    trace!("transfer {} of `{}` rejected", TransferKind::In, name);
    Violation::NonIsolatedTransferIn {
        name: name.to_string(),
        root: root.to_string(),
        span: pos.span(),
    }
}
