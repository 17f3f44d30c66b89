use crate::ast::build::*;
use crate::ast::{BindingDecl, FieldDecl, FnDecl, ObjectDecl, Program, Type};
use crate::dispatch::dispatch_verdict;
use crate::error::IsoError;
use crate::{check, DispatchOracle, DispatchTarget, DispatchVerdict};
use std::sync::Arc;
use std::thread;

fn ints() -> Type {
    Type::array(Type::Int)
}

fn program() -> Program {
    let queue = ObjectDecl::new("Queue")
        .isolated()
        .field(FieldDecl::new("items", ints()).private())
        .method(FnDecl::new(
            "clear",
            vec![lock(vec![assign(
                self_field("Queue", "items", ints()),
                list_of(vec![], ints()),
            )])],
        ));
    let log = ObjectDecl::new("Log")
        .field(FieldDecl::new("lines", ints()))
        .method(FnDecl::new(
            "size",
            vec![ret(int(0))],
        ).returns(Type::Int))
        .method(FnDecl::new(
            "reset",
            vec![assign(
                field(var("self", Type::object("Log")), "lines", ints()),
                list_of(vec![], ints()),
            )],
        ));
    Program::new("dispatch")
        .with_binding(BindingDecl::new("shared", ints(), list(vec![int(1)])).public())
        .with_object(queue)
        .with_object(log)
        .with_function(FnDecl::new("pure", vec![ret(int(1))]).returns(Type::Int))
        .with_function(FnDecl::new("dirty", vec![expr(var("shared", ints()))]))
}

#[test]
fn test_verdicts() {
    let report = check(&program());
    let verdict = |t: DispatchTarget| dispatch_verdict(&report, &t).unwrap();
    assert_eq!(verdict(DispatchTarget::method("Queue", "clear")), DispatchVerdict::SafeConcurrent);
    assert!(verdict(DispatchTarget::function("pure")).is_concurrent());
    assert_eq!(
        verdict(DispatchTarget::function("dirty")),
        DispatchVerdict::SerializeOnSameStrand
    );
}

#[test]
fn test_method_of_non_isolated_object_is_serialized() {
    let report = check(&program());
    assert!(!report.is_isolated_object("Log"));
    // `size` itself touches nothing, the object type still disqualifies it
    assert!(report.is_isolated_fn(&crate::ast::FnId::method("Log", "size")));
    assert_eq!(
        dispatch_verdict(&report, &DispatchTarget::method("Log", "size")).unwrap(),
        DispatchVerdict::SerializeOnSameStrand
    );
}

#[test]
fn test_unknown_target() {
    let oracle = DispatchOracle::default();
    let err = oracle
        .query(&program(), &DispatchTarget::method("Queue", "drain"))
        .unwrap_err();
    assert!(matches!(err, IsoError::UnknownTarget(ref t) if t == "Queue.drain"));
}

#[test]
fn test_oracle_caches_per_program() {
    let oracle = DispatchOracle::default();
    let program = program();
    let first = oracle.report(&program).unwrap();
    let second = oracle.report(&program).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(oracle.cached(), 1);

    let changed = program.clone().with_function(FnDecl::new("extra", vec![]));
    let third = oracle.report(&changed).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(oracle.cached(), 2);

    oracle.clear();
    assert_eq!(oracle.cached(), 0);
}

#[test]
fn test_oracle_shared_between_threads() {
    let oracle = Arc::new(DispatchOracle::default());
    let program = Arc::new(program());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let oracle = Arc::clone(&oracle);
            let program = Arc::clone(&program);
            thread::spawn(move || {
                oracle
                    .query(&program, &DispatchTarget::method("Queue", "clear"))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), DispatchVerdict::SafeConcurrent);
    }
    assert_eq!(oracle.cached(), 1);
}
