/*
 * Responsibility
 * - Register protected operations with their rule (builder at registration time)
 * - Resolve method-level vs scope-level rule once, at build time
 * - Check the current identity before the operation body runs
 */
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::services::auth::context::SecurityContext;
use crate::services::auth::identity::Identity;
use crate::services::authz::arguments::Arguments;
use crate::services::authz::error::AuthzError;
use crate::services::authz::evaluator::{Decision, RuleEvaluator};
use crate::services::authz::rule::DeclaredRule;

/// Entry point for registering protected operations.
#[derive(Clone, Debug, Default)]
pub struct Enforcer {
    evaluator: Arc<RuleEvaluator>,
}

impl Enforcer {
    pub fn new(evaluator: Arc<RuleEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// Start a group of operations (e.g. one service or router) that may share a rule.
    pub fn scope(&self, name: impl Into<String>) -> ScopeBuilder {
        ScopeBuilder {
            name: name.into(),
            rule: None,
            evaluator: self.evaluator.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScopeBuilder {
    name: String,
    rule: Option<DeclaredRule>,
    evaluator: Arc<RuleEvaluator>,
}

impl ScopeBuilder {
    /// Applies to every operation in the scope that declares no rule of its own.
    pub fn rule(mut self, rule: DeclaredRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn operation(&self, name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            name: format!("{}::{}", self.name, name.into()),
            scope_rule: self.rule.clone(),
            rule: None,
            params: Vec::new(),
            evaluator: self.evaluator.clone(),
        }
    }
}

#[derive(Debug)]
pub struct OperationBuilder {
    name: String,
    scope_rule: Option<DeclaredRule>,
    rule: Option<DeclaredRule>,
    params: Vec<String>,
    evaluator: Arc<RuleEvaluator>,
}

impl OperationBuilder {
    /// Method-level rule. Replaces the scope rule for this operation.
    pub fn rule(mut self, rule: DeclaredRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Declared parameter names, in call order.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> ProtectedOperation {
        ProtectedOperation {
            name: self.name,
            rule: self.rule.or(self.scope_rule),
            params: self.params,
            evaluator: self.evaluator,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProtectedOperation {
    name: String,
    rule: Option<DeclaredRule>,
    params: Vec<String>,
    evaluator: Arc<RuleEvaluator>,
}

impl ProtectedOperation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The single rule that governs this operation, if any.
    pub fn rule(&self) -> Option<&DeclaredRule> {
        self.rule.as_ref()
    }

    /// Declared parameter names, in call order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }

    /// Map positional call values onto the declared parameter names.
    /// Extra values are ignored; parameters without a value are absent.
    pub fn bind_positional<I, V>(&self, values: I) -> Arguments
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.iter().cloned().zip(values).collect()
    }

    pub fn check(&self, identity: Option<&Identity>, args: &Arguments) -> Result<(), AuthzError> {
        let Some(rule) = &self.rule else {
            return Ok(());
        };

        let user_id = identity.and_then(|id| id.user_id());
        match self.evaluator.evaluate(rule, identity, args) {
            Decision::Allow => {
                tracing::debug!(operation = %self.name, user_id = ?user_id, rule = %rule, "access granted");
                Ok(())
            }
            Decision::AuthenticationRequired => {
                tracing::warn!(operation = %self.name, "access denied: user not authenticated");
                Err(AuthzError::authentication_required())
            }
            Decision::Deny => {
                tracing::warn!(operation = %self.name, user_id = ?user_id, rule = %rule, "access denied: rule not satisfied");
                Err(AuthzError::access_denied(rule.denied_message()))
            }
        }
    }

    /// Check against the identity in the current security context.
    pub fn authorize(&self, args: &Arguments) -> Result<(), AuthzError> {
        let identity = SecurityContext::get();
        self.check(identity.as_deref(), args)
    }

    /// Run `f` only if the current identity passes the rule.
    pub async fn invoke<F, Fut, T, E>(&self, args: Arguments, f: F) -> Result<T, E>
    where
        F: FnOnce(Arguments) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthzError>,
    {
        self.authorize(&args)?;
        f(args).await
    }
}
