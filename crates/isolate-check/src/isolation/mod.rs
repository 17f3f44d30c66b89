//! The isolation analysis
//!
//! Bottom-up: [`mutability`] classifies types, [`expr`] decides whether an
//! expression is isolated, [`lock`] tracks lock regions and boundary
//! transfers, [`root`] checks isolated bindings and their initializers,
//! [`func`] walks one function or method body, and [`classify`] runs the
//! whole program to a fixpoint and produces the [`Report`].

pub mod classify;
pub mod context;
pub mod expr;
pub mod func;
pub mod lock;
pub mod mutability;
pub mod root;

pub use classify::{check_program, DeclKind, Report, Verdict};
pub use context::{AnalysisContext, Assumptions};
pub use expr::{BindingFacts, BindingLookup, IsolatedExprEvaluator, IsolatedRoot};
pub use lock::{LockRegion, RegionState, TransferKind};
pub use mutability::{classify, Mutability, TypeEnv};

use crate::ast::Name;
use crate::error::Violation;
use crate::pos::Pos;

/// A violation found while analysing one construct.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub violation: Violation,
    pub pos: Pos,
    /// Concerns a binding or object declared `isolated`. Reported as an error
    /// even when the enclosing construct only had its isolation inferred.
    pub pinned: bool,
}

impl Issue {
    pub fn new(violation: Violation, pos: Pos) -> Self {
        Self {
            violation,
            pos,
            pinned: false,
        }
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }
}

/// A use of a module-level binding and whether a lock restricting it was held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingAccess {
    pub name: Name,
    pub locked: bool,
}
