//! Whole-program isolation classification
//!
//! Isolation of one construct depends on isolation of others: a function is
//! isolated only if its callees are, an object only if its methods are, and a
//! binding only if every function touching it locks it. The classifier starts
//! from the optimistic assumption that every declared or candidate construct is
//! isolated, re-checks everything against the assumption and drops the
//! candidates that fail, until nothing changes. Sets only ever shrink, so the
//! loop terminates and yields the greatest consistent assignment, which also
//! accepts mutual recursion between isolated functions.
//!
//! Objects are settled in an outer loop. Assuming an object isolated makes its
//! mutable fields lock roots, which is stricter on its methods than treating
//! `self` as a plain parameter. When an object is dropped, functions and
//! bindings are re-inferred from the top under the smaller object set. The
//! object set only shrinks, so the outer loop terminates too.
//!
//! Declared constructs stay assumed throughout: callers rely on the
//! declaration, and the declaration itself is checked with errors.

use super::context::{AnalysisContext, Assumptions};
use super::func::{FnChecker, FnOutcome};
use super::mutability::is_mutable_field;
use super::root;
use super::{BindingAccess, Issue};
use crate::ast::{FnId, Name, Program};
use crate::config::CheckConfig;
use crate::error::{Finding, FindingRecord, Severity, Violation};
use crate::pos::Pos;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeclKind {
    Function,
    Method,
    Object,
    Binding,
}

/// Final isolation status of one construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decl: Name,
    pub kind: DeclKind,
    /// Carries an explicit `isolated` qualifier.
    pub declared: bool,
    pub isolated: bool,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.isolated, self.declared) {
            (true, true) => "isolated",
            (true, false) => "isolated (inferred)",
            (false, true) => "declared isolated, rejected",
            (false, false) => "not isolated",
        };
        write!(f, "{} `{}`: {}", self.kind, self.decl, status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub program: Name,
    pub verdicts: Vec<Verdict>,
    /// Kept findings, at most `max_findings` of them.
    pub findings: Vec<Finding>,
    /// Error and hint totals before truncation.
    pub error_count: usize,
    pub hint_count: usize,
    /// Rounds the fixpoint needed.
    pub rounds: usize,
}

impl Report {
    /// Any error was found, including errors dropped by `max_findings`.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn hints(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    pub fn findings_for<'a>(&'a self, decl: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.decl.as_str() == decl)
    }

    pub fn verdict(&self, kind: DeclKind, decl: &str) -> Option<&Verdict> {
        self.verdicts
            .iter()
            .find(|v| v.kind == kind && v.decl.as_str() == decl)
    }

    pub fn function_verdict(&self, id: &FnId) -> Option<&Verdict> {
        let kind = if id.is_method() {
            DeclKind::Method
        } else {
            DeclKind::Function
        };
        self.verdict(kind, &id.to_string())
    }

    pub fn is_isolated_fn(&self, id: &FnId) -> bool {
        self.function_verdict(id).map(|v| v.isolated).unwrap_or(false)
    }

    pub fn is_isolated_object(&self, name: &str) -> bool {
        self.verdict(DeclKind::Object, name)
            .map(|v| v.isolated)
            .unwrap_or(false)
    }

    pub fn is_isolated_binding(&self, name: &str) -> bool {
        self.verdict(DeclKind::Binding, name)
            .map(|v| v.isolated)
            .unwrap_or(false)
    }

    pub fn records(&self) -> Vec<FindingRecord> {
        self.findings.iter().map(FindingRecord::from).collect()
    }
}

/// Issues found in one round, per construct.
#[derive(Debug, Default)]
struct Analysis {
    functions: IndexMap<FnId, FnOutcome>,
    objects: IndexMap<Name, Vec<Issue>>,
    bindings: IndexMap<Name, Vec<Issue>>,
    accesses: Vec<BindingAccess>,
}

fn analyze(ctx: &AnalysisContext) -> Analysis {
    let mut analysis = Analysis::default();

    for binding in ctx.bindings() {
        let mut issues = Vec::new();
        if ctx.binding_root(&binding.name).is_some() {
            issues.extend(root::check_binding_initializer(ctx, binding));
        }
        let scan = root::scan_initializer(ctx, &binding.name, &binding.init);
        issues.extend(scan.issues);
        analysis.accesses.extend(scan.accesses);
        analysis.bindings.insert(binding.name.clone(), issues);
    }

    for (id, decl) in ctx.functions() {
        let outcome = FnChecker::new(ctx, id.clone()).check(decl);
        analysis.accesses.extend(outcome.accesses.iter().cloned());
        analysis.functions.insert(id.clone(), outcome);
    }

    for object in ctx.objects() {
        let mut issues = Vec::new();
        for field in &object.fields {
            if !field.private && is_mutable_field(field, ctx) {
                let violation = Violation::MutableFieldNotPrivate {
                    object: object.name.to_string(),
                    field: field.name.to_string(),
                    span: field.pos.span(),
                };
                issues.push(Issue::new(violation, field.pos));
            }
        }
        if ctx.object_is_isolated(&object.name) {
            issues.extend(root::check_field_initializers(ctx, object));
        }
        analysis.objects.insert(object.name.clone(), issues);
    }

    analysis
}

impl Analysis {
    /// Candidates that passed every check this round.
    fn passing(&self, ctx: &AnalysisContext, candidates: &Assumptions) -> Assumptions {
        let functions = candidates
            .functions
            .iter()
            .filter(|id| self.functions.get(*id).map(FnOutcome::is_clean).unwrap_or(false))
            .cloned()
            .collect();
        let objects = candidates
            .objects
            .iter()
            .filter(|name| self.object_is_clean(ctx, name))
            .cloned()
            .collect();
        let bindings = root::infer_bindings(ctx, &candidates.bindings, &self.accesses)
            .into_iter()
            .filter(|name| self.bindings.get(name).map(Vec::is_empty).unwrap_or(false))
            .collect();
        Assumptions {
            functions,
            objects,
            bindings,
        }
    }

    fn object_is_clean(&self, ctx: &AnalysisContext, name: &Name) -> bool {
        let Some(object) = ctx.object(name) else {
            return false;
        };
        let fields_ok = self.objects.get(name).map(Vec::is_empty).unwrap_or(false);
        fields_ok
            && object.methods.iter().all(|m| {
                let id = FnId::method(name.clone(), m.name.clone());
                self.functions.get(&id).map(FnOutcome::is_clean).unwrap_or(false)
            })
    }
}

/// Check a whole program.
pub fn check_program(program: &Program, config: &CheckConfig) -> Report {
    let mut ctx = AnalysisContext::new(program);
    let declared = Assumptions::declared(&ctx);
    let candidates = if config.infer {
        Assumptions::candidates(&ctx)
    } else {
        Assumptions::default()
    };
    // Objects shrink in an outer loop. While an object is assumed isolated its
    // fields are lock roots inside its methods; once it is dropped `self` is an
    // ordinary parameter again, so functions and bindings restart from the top.
    let mut objects: BTreeSet<Name> =
        declared.objects.union(&candidates.objects).cloned().collect();
    let mut rounds = 0;
    let analysis = loop {
        let mut assumed = declared.union(&candidates);
        assumed.objects = objects;
        ctx.assumed = assumed;

        let analysis = loop {
            rounds += 1;
            let analysis = analyze(&ctx);
            let mut next = declared
                .union(&analysis.passing(&ctx, &candidates))
                .intersection(&ctx.assumed);
            next.objects = ctx.assumed.objects.clone();
            debug!(
                "round {}: {} functions, {} objects, {} bindings assumed isolated",
                rounds,
                next.functions.len(),
                next.objects.len(),
                next.bindings.len()
            );
            if next == ctx.assumed {
                break analysis;
            }
            ctx.assumed = next;
        };

        let passing: BTreeSet<Name> = declared
            .objects
            .union(&analysis.passing(&ctx, &candidates).objects)
            .filter(|name| ctx.assumed.objects.contains(*name))
            .cloned()
            .collect();
        if passing == ctx.assumed.objects {
            break analysis;
        }
        debug!(
            "objects dropped after round {}, restarting with {} assumed isolated",
            rounds,
            passing.len()
        );
        objects = passing;
    };

    let report = Reporter {
        ctx: &ctx,
        declared: &declared,
        candidates: &candidates,
        config,
        verdicts: Vec::new(),
        findings: Vec::new(),
    }
    .build(&analysis, rounds);
    info!(
        "checked `{}` in {} round(s): {} error(s), {} hint(s)",
        report.program,
        report.rounds,
        report.error_count,
        report.hint_count
    );
    report
}

struct Reporter<'a, 'p> {
    ctx: &'a AnalysisContext<'p>,
    declared: &'a Assumptions,
    candidates: &'a Assumptions,
    config: &'a CheckConfig,
    verdicts: Vec<Verdict>,
    findings: Vec<Finding>,
}

impl Reporter<'_, '_> {
    fn build(mut self, analysis: &Analysis, rounds: usize) -> Report {
        let ctx = self.ctx;
        for binding in ctx.bindings() {
            let declared = self.declared.bindings.contains(&binding.name);
            let issues = analysis.bindings.get(&binding.name).map(Vec::as_slice).unwrap_or(&[]);
            // failed inference of a binding is silent; only errors are reported
            let errors = self.attribute(&binding.name, issues, declared, false);
            self.verdicts.push(Verdict {
                decl: binding.name.clone(),
                kind: DeclKind::Binding,
                declared,
                isolated: ctx.assumed.bindings.contains(&binding.name) && errors == 0,
            });
        }

        let mut function_verdicts = IndexMap::new();
        for (id, decl) in ctx.functions() {
            let declared = self.declared.functions.contains(id);
            let candidate = self.candidates.functions.contains(id);
            let isolated_now = ctx.assumed.functions.contains(id);
            let name: Name = id.to_string().into();
            let issues = analysis
                .functions
                .get(id)
                .map(|o| o.issues.as_slice())
                .unwrap_or(&[]);
            let errors = self.attribute(&name, issues, declared, candidate);
            if candidate && !isolated_now {
                self.not_isolated(&name, decl.pos);
            }
            let isolated = isolated_now && errors == 0;
            function_verdicts.insert(id.clone(), isolated);
            self.verdicts.push(Verdict {
                decl: name,
                kind: if id.is_method() {
                    DeclKind::Method
                } else {
                    DeclKind::Function
                },
                declared,
                isolated,
            });
        }

        for object in ctx.objects() {
            let declared = self.declared.objects.contains(&object.name);
            let candidate = self.candidates.objects.contains(&object.name);
            let isolated_now = ctx.assumed.objects.contains(&object.name);
            let issues = analysis.objects.get(&object.name).map(Vec::as_slice).unwrap_or(&[]);
            let errors = self.attribute(&object.name, issues, declared, candidate);
            if candidate && !isolated_now {
                self.not_isolated(&object.name, object.pos);
            }
            let methods_ok = object.methods.iter().all(|m| {
                let id = FnId::method(object.name.clone(), m.name.clone());
                function_verdicts.get(&id).copied().unwrap_or(false)
            });
            self.verdicts.push(Verdict {
                decl: object.name.clone(),
                kind: DeclKind::Object,
                declared,
                isolated: isolated_now && errors == 0 && methods_ok,
            });
        }

        let error_count = self.findings.iter().filter(|f| f.is_error()).count();
        let hint_count = self.findings.len() - error_count;
        if let Some(max) = self.config.max_findings {
            self.findings.truncate(max);
        }
        Report {
            program: ctx.program.name.clone(),
            verdicts: self.verdicts,
            findings: self.findings,
            error_count,
            hint_count,
            rounds,
        }
    }

    /// Turn issues into findings. Returns the number of errors.
    fn attribute(&mut self, decl: &Name, issues: &[Issue], declared: bool, hints: bool) -> usize {
        let mut errors = 0;
        for issue in issues {
            let severity = if declared || issue.pinned {
                errors += 1;
                Severity::Error
            } else {
                Severity::Hint
            };
            if severity == Severity::Hint && !(hints && self.config.report_hints) {
                continue;
            }
            self.findings.push(Finding {
                decl: decl.clone(),
                severity,
                violation: issue.violation.clone(),
                line: issue.pos.line,
            });
        }
        errors
    }

    fn not_isolated(&mut self, decl: &Name, pos: Pos) {
        if !self.config.report_hints {
            return;
        }
        self.findings.push(Finding {
            decl: decl.clone(),
            severity: Severity::Hint,
            violation: Violation::NotIsolated {
                name: decl.to_string(),
                span: pos.span(),
            },
            line: pos.line,
        });
    }
}

/// Constructs the analysis inferred as isolated, without their declared ones.
pub fn inferred(report: &Report) -> BTreeSet<Name> {
    report
        .verdicts
        .iter()
        .filter(|v| v.isolated && !v.declared)
        .map(|v| v.decl.clone())
        .collect()
}
