use super::{Expr, Name, Type};
use crate::pos::Pos;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Let {
        name: Name,
        ty: Type,
        init: Expr,
        #[serde(default)]
        is_final: bool,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr {
        expr: Expr,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    /// Mutual-exclusion region.
    Lock {
        body: Vec<Stmt>,
    },
    /// Named worker running concurrently with the enclosing function.
    Worker {
        name: Name,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Block {
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            pos: Pos::default(),
        }
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }
}

fn write_body(f: &mut fmt::Formatter, body: &[Stmt]) -> fmt::Result {
    write!(f, "{{")?;
    for stmt in body {
        write!(f, " {}", stmt)?;
    }
    write!(f, " }}")
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            StmtKind::Let {
                name,
                ty,
                init,
                is_final,
            } => {
                if *is_final {
                    write!(f, "final ")?;
                }
                write!(f, "{} {} = {};", ty, name, init)
            }
            StmtKind::Assign { target, value } => write!(f, "{} = {};", target, value),
            StmtKind::Expr { expr } => write!(f, "{};", expr),
            StmtKind::Return { value: Some(value) } => write!(f, "return {};", value),
            StmtKind::Return { value: None } => write!(f, "return;"),
            StmtKind::Lock { body } => {
                write!(f, "lock ")?;
                write_body(f, body)
            }
            StmtKind::Worker { name, body } => {
                write!(f, "worker {} ", name)?;
                write_body(f, body)
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                write!(f, "if {} ", cond)?;
                write_body(f, then)?;
                if !otherwise.is_empty() {
                    write!(f, " else ")?;
                    write_body(f, otherwise)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                write!(f, "while {} ", cond)?;
                write_body(f, body)
            }
            StmtKind::Block { body } => write_body(f, body),
        }
    }
}
