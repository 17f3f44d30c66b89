//! Lock region behaviour through the full checker

use crate::ast::build::*;
use crate::ast::{BindingDecl, Expr, FnDecl, FnId, Program, Stmt, Type};
use crate::error::{RuleCode, Severity};
use crate::check;
use crate::pos::Pos;

fn ints() -> Type {
    Type::array(Type::Int)
}

fn counter_program(f: FnDecl) -> Program {
    Program::new("locks")
        .with_binding(BindingDecl::new("counter", ints(), list_of(vec![], ints())).isolated())
        .with_function(FnDecl::external("log"))
        .with_function(FnDecl::new("bump", vec![]).isolated())
        .with_function(f)
}

fn declared(name: &str, body: Vec<Stmt>) -> FnDecl {
    FnDecl::new(name, body).isolated()
}

fn rules(program: &Program) -> Vec<RuleCode> {
    check(program).errors().map(|f| f.rule()).collect()
}

#[test]
fn test_lock_without_isolated_state_has_no_transfer_rules() {
    let f = declared(
        "local",
        vec![
            let_("outside", list(vec![int(1)])),
            lock(vec![
                let_("inside", list(vec![int(2)])),
                assign(index(var("inside", ints()), 0), int(3)),
                assign(var("outside", ints()), var("inside", ints())),
            ]),
        ],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_region_locals_are_free_inside_the_region() {
    let f = declared(
        "fill",
        vec![lock(vec![
            let_("tmp", list(vec![int(1)])),
            assign(var("counter", ints()), var("tmp", ints())),
        ])],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_transfer_in_of_outer_mutable_local() {
    let f = declared(
        "fill",
        vec![
            let_("tmp", list(vec![int(1)])),
            lock(vec![assign(var("counter", ints()), var("tmp", ints()))]),
        ],
    );
    assert_eq!(rules(&counter_program(f)), vec![RuleCode::NonIsolatedTransferIn]);
}

#[test]
fn test_outer_local_inside_a_constructor() {
    let f = declared(
        "wrap",
        vec![
            let_("tmp", list(vec![int(1)])),
            lock(vec![assign(
                var("counter", ints()),
                list_of(vec![index(var("tmp", ints()), 0)], ints()),
            )]),
        ],
    );
    assert!(rules(&counter_program(f)).is_empty());

    let nested = Type::array(ints());
    let f = declared(
        "wrap",
        vec![
            let_("tmp", list(vec![int(1)])),
            lock(vec![expr(list_of(
                vec![var("tmp", ints()), clone(var("counter", ints()))],
                nested,
            ))]),
        ],
    );
    assert_eq!(rules(&counter_program(f)), vec![RuleCode::NonIsolatedTransferIn]);
}

#[test]
fn test_copy_out_through_outer_local() {
    let f = declared(
        "snapshot",
        vec![
            let_("copy", list_of(vec![], ints())),
            lock(vec![assign(var("copy", ints()), clone(var("counter", ints())))]),
            ret(var("copy", ints())),
        ],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_calls_inside_lock_must_be_isolated() {
    let f = declared(
        "noisy",
        vec![lock(vec![
            assign(index(var("counter", ints()), 0), int(1)),
            expr(call("bump", vec![], Type::Nil)),
            expr(call("log", vec![], Type::Nil)),
        ])],
    );
    assert_eq!(rules(&counter_program(f)), vec![RuleCode::NonIsolatedCall]);
}

#[test]
fn test_non_isolated_call_in_lock_is_an_error_even_when_inferred() {
    let f = FnDecl::new(
        "noisy",
        vec![lock(vec![
            assign(index(var("counter", ints()), 0), int(1)),
            expr(call("log", vec![], Type::Nil)),
        ])],
    );
    let report = check(&counter_program(f));
    let noisy: Vec<_> = report.findings_for("noisy").collect();
    assert!(noisy
        .iter()
        .any(|f| f.rule() == RuleCode::NonIsolatedCall && f.severity == Severity::Error));
    assert!(noisy
        .iter()
        .any(|f| f.rule() == RuleCode::NotIsolated && f.severity == Severity::Hint));
    assert!(!report.is_isolated_fn(&FnId::function("noisy")));
}

#[test]
fn test_reentrant_lock_on_same_variable() {
    let f = declared(
        "again",
        vec![lock(vec![
            assign(index(var("counter", ints()), 0), int(1)),
            lock(vec![assign(index(var("counter", ints()), 1), int(2))]),
        ])],
    );
    assert_eq!(rules(&counter_program(f)), vec![RuleCode::ReentrantLock]);
}

#[test]
fn test_nested_lock_on_other_state_is_fine() {
    let f = declared(
        "nested",
        vec![lock(vec![
            let_("n", int(0)),
            lock(vec![assign(index(var("counter", ints()), 0), var("n", Type::Int))]),
        ])],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_conditional_and_loop_bodies_stay_inside_the_region() {
    let f = declared(
        "loop",
        vec![lock(vec![while_(
            binary("<", index(var("counter", ints()), 0), int(10)),
            vec![if_(
                binary("==", index(var("counter", ints()), 0), int(5)),
                vec![ret_nil()],
                vec![assign(index(var("counter", ints()), 0), int(6))],
            )],
        )])],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_findings_carry_node_lines() {
    let f = declared(
        "fill",
        vec![
            let_("tmp", list(vec![int(1)])).at(Pos::line(2)),
            lock(vec![assign(
                var("counter", ints()),
                var("tmp", ints()).at(Pos::line(4)),
            )])
            .at(Pos::line(3)),
        ],
    )
    .at(Pos::line(1));
    let report = check(&counter_program(f));
    let lines: Vec<_> = report.errors().map(|f| (f.rule(), f.line)).collect();
    assert_eq!(lines, vec![(RuleCode::NonIsolatedTransferIn, 4)]);
}

fn nested() -> Type {
    Type::array(ints())
}

/// `alias` could store `c` into `xs`; only its arguments decide what crosses
/// into a region.
fn with_alias(f: FnDecl) -> Program {
    counter_program(f).with_function(
        FnDecl::new("alias", vec![ret(int(0))])
            .isolated()
            .param("xs", nested())
            .param("c", ints())
            .returns(Type::Int),
    )
}

fn alias_call(out: Expr) -> Expr {
    call("alias", vec![out, var("counter", ints())], Type::Int)
}

#[test]
fn test_call_arguments_are_checked_on_their_own() {
    let f = declared(
        "leak",
        vec![lock(vec![assign(
            index(var("counter", ints()), 0),
            alias_call(var("out", nested())),
        )])],
    )
    .param("out", nested());
    let report = check(&with_alias(f));
    let rules: Vec<_> = report.errors().map(|f| (f.decl.to_string(), f.rule())).collect();
    assert_eq!(rules, vec![("leak".to_string(), RuleCode::NonIsolatedTransferIn)]);
    assert!(!report.is_isolated_fn(&FnId::function("leak")));

    let f = declared(
        "copy",
        vec![lock(vec![assign(
            index(var("counter", ints()), 0),
            alias_call(clone(var("out", nested()))),
        )])],
    )
    .param("out", nested());
    let report = check(&with_alias(f));
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert!(report.is_isolated_fn(&FnId::function("copy")));
}

#[test]
fn test_clone_of_a_call_does_not_cover_its_arguments() {
    let f = declared(
        "leak",
        vec![lock(vec![expr(clone(alias_call(var("out", nested()))))])],
    )
    .param("out", nested());
    assert_eq!(rules(&with_alias(f)), vec![RuleCode::NonIsolatedTransferIn]);
}

#[test]
fn test_immutable_result_type_does_not_cover_outer_locals() {
    let f = declared(
        "read",
        vec![
            let_("tmp", list(vec![int(1)])),
            lock(vec![assign(
                index(var("counter", ints()), 0),
                index(var("tmp", ints()), 0),
            )]),
        ],
    );
    assert_eq!(rules(&counter_program(f)), vec![RuleCode::NonIsolatedTransferIn]);

    let f = declared(
        "read",
        vec![
            let_("tmp", list(vec![int(1)])),
            lock(vec![assign(
                index(var("counter", ints()), 0),
                index(clone(var("tmp", ints())), 0),
            )]),
        ],
    );
    assert!(rules(&counter_program(f)).is_empty());
}

#[test]
fn test_worker_inside_a_lock_does_not_hold_it() {
    let f = declared(
        "spawn",
        vec![lock(vec![
            assign(index(var("counter", ints()), 0), int(1)),
            worker("w", vec![assign(index(var("counter", ints()), 0), int(2))]),
        ])],
    );
    assert_eq!(
        rules(&counter_program(f)),
        vec![RuleCode::InvalidLockStatementVariableUsage]
    );
}
