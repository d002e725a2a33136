//! Rule expression language.
//!
//! A small, closed language for fine-grained rules, e.g.
//! `isAuthenticated() and user.userId == #userId`. Expressions are parsed once
//! and cached by source string; evaluation only ever calls the four builtins.
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

mod eval;
mod lexer;
mod parser;

pub use eval::{Env, evaluate_bool};
pub use parser::{Builtin, CmpOp, Expr, parse};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("expression produced {0}, expected boolean")]
    NonBoolean(&'static str),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' accessed on null")]
    NullMember(String),
    #[error("'{op}' cannot be applied to {found}")]
    TypeMismatch { op: &'static str, found: &'static str },
    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Parsed expressions keyed by their source text.
///
/// Only successful parses are cached; a broken expression is re-parsed (and
/// re-reported) on every evaluation.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    parsed: DashMap<String, Arc<Expr>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, src: &str) -> Result<Arc<Expr>, ParseError> {
        if let Some(expr) = self.parsed.get(src) {
            return Ok(expr.clone());
        }

        let expr = Arc::new(parse(src)?);
        self.parsed.insert(src.to_string(), expr.clone());
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }

    pub fn clear(&self) {
        self.parsed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_caches_by_source() {
        let cache = ExpressionCache::new();

        let a = cache.compile("hasRole('admin')").unwrap();
        let b = cache.compile("hasRole('admin')").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        assert!(cache.compile("hasRole(").is_err());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
