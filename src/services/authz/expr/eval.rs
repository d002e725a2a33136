use std::cmp::Ordering;

use serde_json::{Value, json};

use super::EvalError;
use super::parser::{Builtin, CmpOp, Expr};
use crate::services::auth::identity::Identity;
use crate::services::authz::arguments::Arguments;

/// Variables visible to an expression.
pub struct Env<'a> {
    identity: &'a Identity,
    user: Value,
    args: &'a Arguments,
}

impl<'a> Env<'a> {
    pub fn new(identity: &'a Identity, args: &'a Arguments) -> Self {
        Self {
            identity,
            user: user_value(identity),
            args,
        }
    }
}

/// `user` as seen from expressions.
fn user_value(identity: &Identity) -> Value {
    json!({
        "userId": identity.user_id(),
        "email": identity.email(),
        "fullName": identity.display_name(),
        "displayName": identity.display_name(),
        "avatarUrl": identity.avatar_url(),
        "roles": identity.roles().iter().collect::<Vec<_>>(),
        "authenticated": identity.is_authenticated(),
        "token": identity.raw_token(),
    })
}

/// Evaluate to a boolean; anything else is an error.
pub fn evaluate_bool(expr: &Expr, env: &Env<'_>) -> Result<bool, EvalError> {
    match eval(expr, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NonBoolean(type_name(&other))),
    }
}

fn eval(expr: &Expr, env: &Env<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) if name == "user" => Ok(env.user.clone()),
        Expr::Var(name) => env
            .args
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Expr::Arg(name) if name == "user" => Ok(env.user.clone()),
        // `#missing` is null rather than an error.
        Expr::Arg(name) => Ok(env.args.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Member {
            target,
            field,
            null_safe,
        } => member(eval(target, env)?, field, *null_safe),
        Expr::Call { builtin, args } => call(*builtin, args, env),
        Expr::Not(inner) => Ok(Value::Bool(!as_bool(eval(inner, env)?, "not")?)),
        Expr::And(lhs, rhs) => {
            if !as_bool(eval(lhs, env)?, "and")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(eval(rhs, env)?, "and")?))
        }
        Expr::Or(lhs, rhs) => {
            if as_bool(eval(lhs, env)?, "or")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(eval(rhs, env)?, "or")?))
        }
        Expr::Compare { op, lhs, rhs } => compare(*op, &eval(lhs, env)?, &eval(rhs, env)?),
        Expr::In { needle, haystack } => contains(&eval(haystack, env)?, &eval(needle, env)?),
    }
}

fn member(target: Value, field: &str, null_safe: bool) -> Result<Value, EvalError> {
    match target {
        Value::Null if null_safe => Ok(Value::Null),
        Value::Null => Err(EvalError::NullMember(field.to_string())),
        Value::Object(mut map) => map
            .remove(field)
            .ok_or_else(|| EvalError::UnknownField(field.to_string())),
        other => Err(EvalError::TypeMismatch {
            op: ".",
            found: type_name(&other),
        }),
    }
}

fn call(builtin: Builtin, args: &[Expr], env: &Env<'_>) -> Result<Value, EvalError> {
    let mut roles = Vec::new();
    for arg in args {
        match eval(arg, env)? {
            Value::String(s) => roles.push(s),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => roles.push(s),
                        other => return Err(bad_argument(builtin, &other)),
                    }
                }
            }
            other => return Err(bad_argument(builtin, &other)),
        }
    }

    let identity = env.identity;
    let result = match builtin {
        Builtin::IsAuthenticated => {
            expect_arity(builtin, &roles, 0)?;
            identity.is_authenticated()
        }
        Builtin::HasRole => {
            expect_arity(builtin, &roles, 1)?;
            identity.is_authenticated() && identity.has_role(&roles[0])
        }
        Builtin::HasAnyRole => identity.is_authenticated() && identity.has_any_role(roles.as_slice()),
        Builtin::HasAllRoles => identity.is_authenticated() && identity.has_all_roles(roles.as_slice()),
    };

    Ok(Value::Bool(result))
}

fn expect_arity(builtin: Builtin, roles: &[String], expected: usize) -> Result<(), EvalError> {
    if roles.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: builtin.name(),
            expected,
            found: roles.len(),
        })
    }
}

fn bad_argument(builtin: Builtin, value: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: builtin.name(),
        found: type_name(value),
    }
}

fn as_bool(value: Value, op: &'static str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            op,
            found: type_name(&other),
        }),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let result = match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = order(lhs, rhs)?;
            match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    };
    Ok(Value::Bool(result))
}

fn order(lhs: &Value, rhs: &Value) -> Result<Ordering, EvalError> {
    match (lhs, rhs) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or(EvalError::TypeMismatch {
                op: "compare",
                found: "number",
            }),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (a, _) => Err(EvalError::TypeMismatch {
            op: "compare",
            found: type_name(a),
        }),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<Value, EvalError> {
    match (haystack, needle) {
        (Value::Array(items), _) => Ok(Value::Bool(
            items.iter().any(|item| values_equal(item, needle)),
        )),
        (Value::String(s), Value::String(sub)) => Ok(Value::Bool(s.contains(sub.as_str()))),
        (other, _) => Err(EvalError::TypeMismatch {
            op: "in",
            found: type_name(other),
        }),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
