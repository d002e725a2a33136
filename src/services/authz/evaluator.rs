//! Decide allow/deny for a declared rule against the current identity.
use crate::services::auth::identity::Identity;
use crate::services::authz::arguments::Arguments;
use crate::services::authz::expr::{Env, ExpressionCache, evaluate_bool};
use crate::services::authz::rule::{DeclaredRule, RuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// Absent or unauthenticated identity; checked before any rule.
    AuthenticationRequired,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Default)]
pub struct RuleEvaluator {
    expressions: ExpressionCache,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expressions(&self) -> &ExpressionCache {
        &self.expressions
    }

    pub fn evaluate(
        &self,
        rule: &DeclaredRule,
        identity: Option<&Identity>,
        args: &Arguments,
    ) -> Decision {
        let identity = match identity {
            Some(id) if id.is_authenticated() => id,
            _ => return Decision::AuthenticationRequired,
        };

        let allowed = match rule.kind() {
            // An empty role set is vacuously satisfied.
            RuleKind::AnyRole(roles) => roles.is_empty() || identity.has_any_role(roles.as_slice()),
            RuleKind::Expression(src) => self.evaluate_expression(src, identity, args),
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Fails closed: parse and evaluation errors are logged and deny.
    fn evaluate_expression(&self, src: &str, identity: &Identity, args: &Arguments) -> bool {
        let expr = match self.expressions.compile(src) {
            Ok(expr) => expr,
            Err(err) => {
                tracing::error!(expression = %src, error = %err, "failed to parse security expression");
                return false;
            }
        };

        match evaluate_bool(&expr, &Env::new(identity, args)) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(expression = %src, error = %err, "failed to evaluate security expression");
                false
            }
        }
    }
}
