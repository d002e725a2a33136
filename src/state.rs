/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - token validator, public path list, user directory, outbound credentials, enforcer
 * - Cheap to Clone (everything inside is Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::middleware::auth::gate::PublicPaths;
use crate::services::auth::credentials::CredentialCache;
use crate::services::auth::validator::TokenValidator;
use crate::services::authz::Enforcer;
use crate::services::users::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<dyn TokenValidator>,
    pub public_paths: Arc<PublicPaths>,
    pub users: Arc<dyn UserDirectory>,
    pub credentials: Arc<CredentialCache>,
    pub enforcer: Enforcer,
}

impl AppState {
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        public_paths: PublicPaths,
        users: Arc<dyn UserDirectory>,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        Self {
            validator,
            public_paths: Arc::new(public_paths),
            users,
            credentials,
            enforcer: Enforcer::default(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("public_paths", &self.public_paths)
            .field("users", &self.users.backend_name())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
