//! Terse constructors for typed program fragments
//!
//! Hosts embedding the checker and the test-suite build programs by hand;
//! these helpers fill in the static types the front-end would otherwise
//! provide.
//!
//! ```rust
//! use isolate_check::ast::build::*;
//! use isolate_check::ast::Type;
//!
//! let a = var("a", Type::array(Type::Int));
//! let init = list(vec![list(vec![int(1), int(3)]), clone(a), list(vec![int(4)])]);
//! assert_eq!(init.ty, Type::array(Type::array(Type::Int)));
//! ```

use super::{Callee, Expr, ExprKind, Name, Stmt, StmtKind, Type};

pub fn int(value: i64) -> Expr {
    Expr::new(
        ExprKind::Literal {
            text: value.to_string().into(),
        },
        Type::Int,
    )
}

pub fn string(value: &str) -> Expr {
    Expr::new(
        ExprKind::Literal {
            text: format!("{:?}", value).into(),
        },
        Type::Str,
    )
}

pub fn nil() -> Expr {
    Expr::new(ExprKind::Literal { text: "()".into() }, Type::Nil)
}

pub fn var(name: impl Into<Name>, ty: Type) -> Expr {
    Expr::new(ExprKind::Var { name: name.into() }, ty)
}

/// List constructor typed as an array of its first element's type.
pub fn list(elems: Vec<Expr>) -> Expr {
    let elem = elems.first().map(|e| e.ty.clone()).unwrap_or(Type::Any);
    list_of(elems, Type::array(elem))
}

pub fn list_of(elems: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(ExprKind::Construct { elems }, ty)
}

pub fn field(base: Expr, name: impl Into<Name>, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Field {
            base: Box::new(base),
            name: name.into(),
        },
        ty,
    )
}

pub fn self_field(object: impl Into<Name>, name: impl Into<Name>, ty: Type) -> Expr {
    field(var("self", Type::Object(object.into())), name, ty)
}

pub fn index(base: Expr, at: i64) -> Expr {
    let ty = base.ty.element();
    Expr::new(
        ExprKind::Index {
            base: Box::new(base),
            index: Box::new(int(at)),
        },
        ty,
    )
}

pub fn call(name: impl Into<Name>, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Call {
            callee: Callee::Function { name: name.into() },
            args,
        },
        ty,
    )
}

/// Method call; `receiver` becomes the first argument.
pub fn method_call(
    object: impl Into<Name>,
    method: impl Into<Name>,
    receiver: Expr,
    args: Vec<Expr>,
    ty: Type,
) -> Expr {
    let mut all = vec![receiver];
    all.extend(args);
    Expr::new(
        ExprKind::Call {
            callee: Callee::Method {
                object: object.into(),
                method: method.into(),
            },
            args: all,
        },
        ty,
    )
}

pub fn start(name: impl Into<Name>, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Start {
            callee: Callee::Function { name: name.into() },
            args,
        },
        ty,
    )
}

pub fn clone(operand: Expr) -> Expr {
    let ty = operand.ty.clone();
    Expr::new(
        ExprKind::Clone {
            operand: Box::new(operand),
        },
        ty,
    )
}

pub fn clone_readonly(operand: Expr) -> Expr {
    let ty = Type::readonly(operand.ty.clone());
    Expr::new(
        ExprKind::CloneReadonly {
            operand: Box::new(operand),
        },
        ty,
    )
}

pub fn binary(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    let ty = lhs.ty.clone();
    Expr::new(
        ExprKind::Binary {
            op: op.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

pub fn let_(name: impl Into<Name>, init: Expr) -> Stmt {
    let ty = init.ty.clone();
    Stmt::new(StmtKind::Let {
        name: name.into(),
        ty,
        init,
        is_final: false,
    })
}

pub fn final_(name: impl Into<Name>, init: Expr) -> Stmt {
    let ty = init.ty.clone();
    Stmt::new(StmtKind::Let {
        name: name.into(),
        ty,
        init,
        is_final: true,
    })
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::new(StmtKind::Assign { target, value })
}

pub fn expr(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr { expr })
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::new(StmtKind::Return { value: Some(value) })
}

pub fn ret_nil() -> Stmt {
    Stmt::new(StmtKind::Return { value: None })
}

pub fn lock(body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Lock { body })
}

pub fn worker(name: impl Into<Name>, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::Worker {
        name: name.into(),
        body,
    })
}

pub fn if_(cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::If {
        cond,
        then,
        otherwise,
    })
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::While { cond, body })
}
