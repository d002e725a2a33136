/*
 * Responsibility
 * - The validated principal (Identity) seen by rules and handlers
 * - Role parsing from the authority's comma-separated format
 * - Role matching that treats `admin` and `ROLE_admin` as the same role
 */
use std::collections::BTreeSet;

use serde::Serialize;

const ROLE_PREFIX: &str = "ROLE_";

/// Input for building an authenticated [`Identity`].
///
/// Kept separate from `Identity` so the only way to get `authenticated == true`
/// is to provide a user id.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: BTreeSet<String>,
    pub raw_token: Option<String>,
}

/// The resolved caller of the current request.
///
/// - Unauthenticated identities never carry a user id or roles.
/// - Immutable once constructed (fields are private).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    user_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    roles: BTreeSet<String>,
    #[serde(skip)]
    raw_token: Option<String>,
    authenticated: bool,
}

impl Identity {
    /// A blank user id cannot name a principal; the result is unauthenticated.
    pub fn authenticated(input: AuthenticatedIdentity) -> Self {
        if input.user_id.trim().is_empty() {
            tracing::warn!("authenticated identity without a user id; treating as unauthenticated");
            return Self::unauthenticated(input.raw_token);
        }
        Self {
            user_id: Some(input.user_id),
            email: input.email,
            display_name: input.display_name,
            avatar_url: input.avatar_url,
            roles: input.roles,
            raw_token: input.raw_token,
            authenticated: true,
        }
    }

    /// Credentials were supplied but rejected (or could not be checked).
    pub fn unauthenticated(raw_token: Option<String>) -> Self {
        Self {
            user_id: None,
            email: None,
            display_name: None,
            avatar_url: None,
            roles: BTreeSet::new(),
            raw_token,
            authenticated: false,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| role_matches(held, role))
    }

    /// `false` for an empty list.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }

    /// `true` for an empty list.
    pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().all(|r| self.has_role(r.as_ref()))
    }
}

/// Parse roles in the authority's format (e.g. `"ROLE_admin,ROLE_student"`).
pub fn parse_roles(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `held` satisfies a check for `required` if they are equal once a single
/// leading `ROLE_` is stripped from each side.
pub fn role_matches(held: &str, required: &str) -> bool {
    strip_prefix(held) == strip_prefix(required)
}

fn strip_prefix(role: &str) -> &str {
    role.strip_prefix(ROLE_PREFIX).unwrap_or(role)
}
