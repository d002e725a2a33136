/*
 * Responsibility
 * - The rule attached to a protected operation (role set or expression)
 * - Optional custom denial message carried to the client
 */

pub const DEFAULT_ROLE_DENIED_MESSAGE: &str = "Access denied: insufficient privileges";
pub const DEFAULT_EXPRESSION_DENIED_MESSAGE: &str = "Access denied: authorization failed";
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str = "Authentication required";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Passes if the identity holds at least one of the roles.
    AnyRole(Vec<String>),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRule {
    kind: RuleKind,
    message: Option<String>,
}

impl DeclaredRule {
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: RuleKind::AnyRole(roles.into_iter().map(Into::into).collect()),
            message: None,
        }
    }

    pub fn expression(src: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Expression(src.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// The custom message, or the default for this kind of rule.
    pub fn denied_message(&self) -> &str {
        match (&self.message, &self.kind) {
            (Some(m), _) => m,
            (None, RuleKind::AnyRole(_)) => DEFAULT_ROLE_DENIED_MESSAGE,
            (None, RuleKind::Expression(_)) => DEFAULT_EXPRESSION_DENIED_MESSAGE,
        }
    }
}

impl std::fmt::Display for DeclaredRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            RuleKind::AnyRole(roles) => write!(f, "anyRole({})", roles.join(", ")),
            RuleKind::Expression(src) => write!(f, "expr({src})"),
        }
    }
}
