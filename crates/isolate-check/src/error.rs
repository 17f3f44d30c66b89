//! Error types and diagnostics for the isolation checker
//!
//! Rule violations are never raised as Rust errors: the checker collects them
//! as [`Finding`]s and keeps going. [`IsoError`] covers what can go wrong
//! around the analysis (reading a program model, loading configuration,
//! asking about an unknown dispatch target).
//!
//! Diagnostics are rendered with `miette`, the same way for every rule: a
//! stable code, a labelled span and a help line.

use crate::ast::Name;
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type IsoResult<T> = std::result::Result<T, IsoError>;

/// Operational errors of the checker host.
#[derive(Error, Diagnostic, Debug)]
pub enum IsoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid program model: {0}")]
    #[diagnostic(
        code(isolate_E0001),
        help("The program model must be the JSON form of `isolate_check::ast::Program`")
    )]
    Model(#[from] serde_json::Error),

    #[error("invalid configuration in {path}: {message}")]
    #[diagnostic(code(isolate_E0002))]
    Config { path: String, message: String },

    #[error("unknown dispatch target `{0}`")]
    #[diagnostic(
        code(isolate_E0003),
        help("The target must name a function, or a method of a declared object type")
    )]
    UnknownTarget(String),

    #[error("failed to fingerprint program: {0}")]
    #[diagnostic(code(isolate_E0004))]
    Fingerprint(#[from] bincode::Error),
}

/// Stable identifiers of the isolation rules.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
pub enum RuleCode {
    NotIsolated,
    MultipleRestrictedVariables,
    NonIsolatedTransferOut,
    NonIsolatedTransferIn,
    InvalidLockStatementVariableUsage,
    MutableFieldNotPrivate,
    InvalidCaptureInConcurrentUnit,
    ReentrantLock,
    NonIsolatedCall,
    NonIsolatedStateAccess,
    InvalidIsolatedInitializer,
}

impl RuleCode {
    /// Long-form explanation shown by `isolate explain`.
    pub fn explanation(self) -> &'static str {
        match self {
            RuleCode::NotIsolated => {
                "The construct was not declared `isolated` and could not be inferred \
                 as isolated. Nothing is rejected: concurrent dispatch of its methods \
                 is disabled and calls to it make the caller non-isolated."
            }
            RuleCode::MultipleRestrictedVariables => {
                "A lock statement may restrict at most one isolated variable. Split the \
                 lock into one lock per isolated variable."
            }
            RuleCode::NonIsolatedTransferOut => {
                "A value leaving a lock statement (returned, or assigned to a variable \
                 declared outside the lock) must be an isolated expression, otherwise it \
                 may alias the state the lock protects. Use `.clone()` or \
                 `.cloneReadOnly()`."
            }
            RuleCode::NonIsolatedTransferIn => {
                "A variable declared outside a lock statement may only be used inside it \
                 through an isolated expression, otherwise the protected state may end \
                 up aliased by that variable."
            }
            RuleCode::InvalidLockStatementVariableUsage => {
                "An isolated variable, or a mutable field of an isolated object accessed \
                 through `self`, may only be accessed inside a lock statement that \
                 restricts it."
            }
            RuleCode::MutableFieldNotPrivate => {
                "Every mutable field of an isolated object must be private. A field is \
                 mutable unless it is final and of an immutable or isolated object type."
            }
            RuleCode::InvalidCaptureInConcurrentUnit => {
                "Variables captured by a worker must be final and immutable (or of an \
                 isolated object type), and arguments of an asynchronous `start` call \
                 must be isolated expressions."
            }
            RuleCode::ReentrantLock => {
                "A lock statement restricting an isolated variable may not be nested \
                 inside another lock statement restricting the same variable."
            }
            RuleCode::NonIsolatedCall => {
                "An isolated function may only call isolated functions and methods, and \
                 every call inside a lock statement must target an isolated function."
            }
            RuleCode::NonIsolatedStateAccess => {
                "An isolated function may only access module-level state that is final \
                 and immutable, final and of an isolated object type, or an isolated \
                 variable accessed inside a lock statement."
            }
            RuleCode::InvalidIsolatedInitializer => {
                "The initializer of an isolated variable, or of a mutable field of an \
                 isolated object, must be an isolated expression so that the variable \
                 starts out as the only access path to its mutable state."
            }
        }
    }
}

/// Whether a finding blocks acceptance of the program.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Isolation was only inferred; the construct is treated as not isolated.
    Hint,
    /// Isolation was declared; the program is rejected.
    Error,
}

impl From<Severity> for miette::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Hint => miette::Severity::Advice,
            Severity::Error => miette::Severity::Error,
        }
    }
}

// ============================================================================
// Rule violations (E0400-E0499)
// ============================================================================

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("`{name}` is not isolated")]
    #[diagnostic(
        code(isolate_E0400),
        help("Concurrent dispatch is disabled for `{name}`; see the other hints for the reason")
    )]
    NotIsolated {
        name: String,
        #[label("not inferred as isolated")]
        span: SourceSpan,
    },

    #[error("lock statement accesses more than one isolated variable")]
    #[diagnostic(
        code(isolate_E0401),
        help("`{first}` and `{second}` are both restricted here; use one lock per variable")
    )]
    MultipleRestrictedVariables {
        first: String,
        second: String,
        #[label("this lock")]
        span: SourceSpan,
    },

    #[error("invalid transfer out of a lock statement restricting {root}")]
    #[diagnostic(
        code(isolate_E0402),
        help("Transfer an isolated expression instead, e.g. `.clone()` the value")
    )]
    NonIsolatedTransferOut {
        root: String,
        #[label("not an isolated expression")]
        span: SourceSpan,
    },

    #[error("invalid transfer of `{name}` into a lock statement restricting {root}")]
    #[diagnostic(
        code(isolate_E0403),
        help("`{name}` is declared outside the lock; use it only through an isolated expression")
    )]
    NonIsolatedTransferIn {
        name: String,
        root: String,
        #[label("`{name}` is mutable and declared outside the lock")]
        span: SourceSpan,
    },

    #[error("invalid access of {root} outside a lock statement")]
    #[diagnostic(
        code(isolate_E0404),
        help("Wrap the access in a `lock` statement")
    )]
    InvalidLockStatementVariableUsage {
        root: String,
        #[label("accessed here")]
        span: SourceSpan,
    },

    #[error("mutable field `{field}` of `{object}` is not private")]
    #[diagnostic(
        code(isolate_E0405),
        help("Make `{field}` private, or final with an immutable type")
    )]
    MutableFieldNotPrivate {
        object: String,
        field: String,
        #[label("mutable field")]
        span: SourceSpan,
    },

    #[error("invalid use of `{name}` in a concurrent unit")]
    #[diagnostic(code(isolate_E0406), help("{reason}"))]
    InvalidCaptureInConcurrentUnit {
        name: String,
        reason: String,
        #[label("captured here")]
        span: SourceSpan,
    },

    #[error("lock statement restricting {root} is nested in a lock restricting it")]
    #[diagnostic(code(isolate_E0407), help("Remove the inner lock statement"))]
    ReentrantLock {
        root: String,
        #[label("nested lock")]
        span: SourceSpan,
    },

    #[error("call to non-isolated function `{callee}`")]
    #[diagnostic(
        code(isolate_E0408),
        help("Only isolated functions and methods may be called here")
    )]
    NonIsolatedCall {
        callee: String,
        #[label("`{callee}` is not isolated")]
        span: SourceSpan,
    },

    #[error("access to mutable module-level state `{name}`")]
    #[diagnostic(
        code(isolate_E0409),
        help("Declare `{name}` as `isolated` and access it inside a lock, or make it final and immutable")
    )]
    NonIsolatedStateAccess {
        name: String,
        #[label("mutable module-level variable")]
        span: SourceSpan,
    },

    #[error("initializer of isolated `{name}` is not an isolated expression")]
    #[diagnostic(
        code(isolate_E0410),
        help("Clone values that may be aliased elsewhere")
    )]
    InvalidIsolatedInitializer {
        name: String,
        #[label("this sub-expression is not isolated")]
        span: SourceSpan,
    },
}

impl Violation {
    pub fn rule(&self) -> RuleCode {
        match self {
            Violation::NotIsolated { .. } => RuleCode::NotIsolated,
            Violation::MultipleRestrictedVariables { .. } => RuleCode::MultipleRestrictedVariables,
            Violation::NonIsolatedTransferOut { .. } => RuleCode::NonIsolatedTransferOut,
            Violation::NonIsolatedTransferIn { .. } => RuleCode::NonIsolatedTransferIn,
            Violation::InvalidLockStatementVariableUsage { .. } => {
                RuleCode::InvalidLockStatementVariableUsage
            }
            Violation::MutableFieldNotPrivate { .. } => RuleCode::MutableFieldNotPrivate,
            Violation::InvalidCaptureInConcurrentUnit { .. } => {
                RuleCode::InvalidCaptureInConcurrentUnit
            }
            Violation::ReentrantLock { .. } => RuleCode::ReentrantLock,
            Violation::NonIsolatedCall { .. } => RuleCode::NonIsolatedCall,
            Violation::NonIsolatedStateAccess { .. } => RuleCode::NonIsolatedStateAccess,
            Violation::InvalidIsolatedInitializer { .. } => RuleCode::InvalidIsolatedInitializer,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            Violation::NotIsolated { span, .. }
            | Violation::MultipleRestrictedVariables { span, .. }
            | Violation::NonIsolatedTransferOut { span, .. }
            | Violation::NonIsolatedTransferIn { span, .. }
            | Violation::InvalidLockStatementVariableUsage { span, .. }
            | Violation::MutableFieldNotPrivate { span, .. }
            | Violation::InvalidCaptureInConcurrentUnit { span, .. }
            | Violation::ReentrantLock { span, .. }
            | Violation::NonIsolatedCall { span, .. }
            | Violation::NonIsolatedStateAccess { span, .. }
            | Violation::InvalidIsolatedInitializer { span, .. } => *span,
        }
    }
}

/// A violation attributed to a declaration, with the severity it carries
/// there.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Function, method, object or binding the finding belongs to.
    pub decl: Name,
    pub severity: Severity,
    pub violation: Violation,
    /// 1-based line of the offending node, 0 when unknown.
    pub line: usize,
}

impl Finding {
    pub fn rule(&self) -> RuleCode {
        self.violation.rule()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.violation)
    }
}

impl std::error::Error for Finding {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.violation)
    }
}

impl Diagnostic for Finding {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.violation.code()
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity.into())
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.violation.help()
    }

    fn url<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.violation.url()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.violation.labels()
    }
}

/// Flat, serializable form of a finding for machine-readable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub decl: Name,
    pub code: RuleCode,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub offset: usize,
    pub len: usize,
}

impl From<&Finding> for FindingRecord {
    fn from(finding: &Finding) -> Self {
        let span = finding.violation.span();
        Self {
            decl: finding.decl.clone(),
            code: finding.rule(),
            severity: finding.severity,
            message: finding.violation.to_string(),
            line: finding.line,
            offset: span.offset(),
            len: span.len(),
        }
    }
}
