//! Boolean predicate evaluation over packed records.
//!
//! The scan engine hands each candidate record to an expression tree and
//! keeps the record when the tree evaluates to `true`. Attribute references
//! resolve by name through the schema and decode straight from the record's
//! packed bytes.


use catalog::Schema;
use common::{DbError, DbResult, Record};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Reference to a schema attribute by name.
    Attr(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn attr(name: impl Into<String>) -> Self {
        Expr::Attr(name.into())
    }

    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

/// Evaluation context borrowing the schema records are packed under.
pub struct EvalContext<'a> {
    pub schema: &'a Schema,
}

impl<'a> EvalContext<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Evaluate an expression over a given record.
    pub fn eval(&self, expr: &Expr, record: &Record) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Attr(name) => {
                let idx = self
                    .schema
                    .attr_index(name)
                    .ok_or_else(|| DbError::Expr(format!("unknown attribute '{name}'")))?;
                self.schema.get_attr(record, idx)
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, record)?;
                match op {
                    UnaryOp::Not => {
                        let b = v
                            .as_bool()
                            .ok_or_else(|| DbError::Expr(format!("NOT expects bool, got {v:?}")))?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, record)?;
                let rv = self.eval(right, record)?;
                self.eval_binary(&lv, *op, &rv)
            }
        }
    }

    /// Evaluate a scan predicate down to a boolean; an absent predicate
    /// accepts every record.
    pub fn eval_predicate(&self, predicate: Option<&Expr>, record: &Record) -> DbResult<bool> {
        match predicate {
            None => Ok(true),
            Some(expr) => {
                let v = self.eval(expr, record)?;
                v.as_bool()
                    .ok_or_else(|| DbError::Expr(format!("predicate is not boolean: {v:?}")))
            }
        }
    }

    fn eval_binary(&self, l: &Value, op: BinaryOp, r: &Value) -> DbResult<Value> {
        use BinaryOp::*;

        if let And | Or = op {
            let lb = l
                .as_bool()
                .ok_or_else(|| DbError::Expr(format!("AND/OR expects bools, got {l:?}")))?;
            let rb = r
                .as_bool()
                .ok_or_else(|| DbError::Expr(format!("AND/OR expects bools, got {r:?}")))?;
            return Ok(Value::Bool(match op {
                And => lb && rb,
                Or => lb || rb,
                _ => unreachable!(),
            }));
        }

        let ord = l.cmp_same_type(r).ok_or_else(|| {
            DbError::Expr(format!("incompatible types for {op:?}: {l:?}, {r:?}"))
        })?;

        let result = match op {
            Eq => ord == Ordering::Equal,
            Ne => ord != Ordering::Equal,
            Lt => ord == Ordering::Less,
            Le => ord != Ordering::Greater,
            Gt => ord == Ordering::Greater,
            Ge => ord != Ordering::Less,
            _ => unreachable!(),
        };

        Ok(Value::Bool(result))
    }
}
