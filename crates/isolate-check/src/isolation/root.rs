//! Isolation roots at module level
//!
//! Isolated bindings and the mutable fields of isolated objects must start out
//! as the only access path to their state, so their initializers have to be
//! isolated expressions. Bindings without a qualifier can have isolation
//! inferred: non-public, isolated initializer, and every access made while a
//! lock restricting them is held.

use super::context::AnalysisContext;
use super::expr::IsolatedExprEvaluator;
use super::mutability::is_mutable_field;
use super::{BindingAccess, Issue};
use crate::ast::{BindingDecl, Expr, ExprKind, Name, ObjectDecl};
use crate::error::Violation;
use log::trace;
use std::collections::BTreeSet;

/// Check the initializer of an isolated binding.
pub fn check_binding_initializer(ctx: &AnalysisContext, binding: &BindingDecl) -> Option<Issue> {
    let evaluator = IsolatedExprEvaluator::new(ctx, None);
    let offender = evaluator.first_offender(&binding.init)?;
    trace!("initializer of `{}` not isolated at `{}`", binding.name, offender);
    let violation = Violation::InvalidIsolatedInitializer {
        name: binding.name.to_string(),
        span: offender.pos.span(),
    };
    Some(Issue::new(violation, offender.pos).pinned(binding.isolated))
}

/// Check the initializers of the mutable fields of an isolated object.
pub fn check_field_initializers(ctx: &AnalysisContext, object: &ObjectDecl) -> Vec<Issue> {
    let evaluator = IsolatedExprEvaluator::new(ctx, None);
    object
        .fields
        .iter()
        .filter(|f| is_mutable_field(f, ctx))
        .filter_map(|f| {
            let init = f.init.as_ref()?;
            let offender = evaluator.first_offender(init)?;
            let violation = Violation::InvalidIsolatedInitializer {
                name: format!("{}.{}", object.name, f.name),
                span: offender.pos.span(),
            };
            Some(Issue::new(violation, offender.pos))
        })
        .collect()
}

/// Result of scanning one module-level initializer for references to other
/// module-level bindings. Initializers run outside any lock.
#[derive(Debug, Default)]
pub struct InitializerScan {
    pub accesses: Vec<BindingAccess>,
    pub issues: Vec<Issue>,
}

pub fn scan_initializer(ctx: &AnalysisContext, owner: &Name, init: &Expr) -> InitializerScan {
    let mut scan = InitializerScan::default();
    visit(ctx, owner, init, &mut scan);
    scan
}

fn visit(ctx: &AnalysisContext, owner: &Name, expr: &Expr, scan: &mut InitializerScan) {
    if let ExprKind::Var { name } = &expr.kind {
        if name == owner {
            return;
        }
        let Some(binding) = ctx.binding(name) else {
            return;
        };
        scan.accesses.push(BindingAccess {
            name: name.clone(),
            locked: false,
        });
        if let Some(root) = ctx.binding_root(name) {
            let violation = Violation::InvalidLockStatementVariableUsage {
                root: root.to_string(),
                span: expr.pos.span(),
            };
            let issue = Issue::new(violation, expr.pos).pinned(binding.isolated);
            scan.issues.push(issue);
        }
        return;
    }
    for child in expr.children() {
        visit(ctx, owner, child, scan);
    }
}

/// Keep the candidate bindings that still qualify as isolated: isolated
/// initializer and no access made without a lock restricting them.
pub fn infer_bindings(
    ctx: &AnalysisContext,
    candidates: &BTreeSet<Name>,
    accesses: &[BindingAccess],
) -> BTreeSet<Name> {
    let evaluator = IsolatedExprEvaluator::new(ctx, None);
    candidates
        .iter()
        .filter(|name| {
            let Some(binding) = ctx.binding(name) else {
                return false;
            };
            if !evaluator.is_isolated(&binding.init) {
                trace!("`{}` not inferred: initializer is not isolated", name);
                return false;
            }
            let unlocked = accesses.iter().any(|a| &a.name == *name && !a.locked);
            if unlocked {
                trace!("`{}` not inferred: accessed outside a lock", name);
            }
            !unlocked
        })
        .cloned()
        .collect()
}
