//! Request-scoped security context.
//!
//! The current [`Identity`] lives in a task-local slot that only exists while a
//! request future runs inside [`SecurityContext::scope`]. Concurrent requests run
//! in different scopes and never see each other's identity.
//!
//! ```ignore
//! SecurityContext::scope(async move {
//!     let _guard = SecurityContext::set(identity);
//!     next.run(req).await
//! })
//! .await
//! ```
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use crate::services::auth::identity::Identity;

tokio::task_local! {
    static CURRENT_IDENTITY: RefCell<Option<Arc<Identity>>>;
}

pub struct SecurityContext;

impl SecurityContext {
    /// Run `fut` with a fresh, empty context slot.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CURRENT_IDENTITY.scope(RefCell::new(None), fut).await
    }

    /// Blocking counterpart of [`SecurityContext::scope`].
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        CURRENT_IDENTITY.sync_scope(RefCell::new(None), f)
    }

    /// Store `identity` for the current scope. The returned guard clears it on drop.
    pub fn set(identity: impl Into<Arc<Identity>>) -> ContextGuard {
        let identity: Arc<Identity> = identity.into();
        let user_id = identity.user_id().map(str::to_string);

        let stored = CURRENT_IDENTITY
            .try_with(|slot| {
                *slot.borrow_mut() = Some(identity);
            })
            .is_ok();

        if stored {
            tracing::trace!(user_id = ?user_id, "security context set");
        } else {
            tracing::debug!("security context set outside of a request scope; ignored");
        }

        ContextGuard { _private: () }
    }

    pub fn get() -> Option<Arc<Identity>> {
        CURRENT_IDENTITY
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn clear() {
        if let Ok(Some(previous)) = CURRENT_IDENTITY.try_with(|slot| slot.borrow_mut().take()) {
            tracing::trace!(user_id = ?previous.user_id(), "security context cleared");
        }
    }

    pub fn is_authenticated() -> bool {
        Self::get().is_some_and(|id| id.is_authenticated())
    }

    pub fn current_user_id() -> Option<String> {
        Self::get().and_then(|id| id.user_id().map(str::to_string))
    }

    pub fn current_email() -> Option<String> {
        Self::get().and_then(|id| id.email().map(str::to_string))
    }

    pub fn has_role(role: &str) -> bool {
        Self::get().is_some_and(|id| id.has_role(role))
    }

    pub fn has_any_role<S: AsRef<str>>(roles: &[S]) -> bool {
        Self::get().is_some_and(|id| id.has_any_role(roles))
    }
}

/// Clears the context slot when dropped, on every exit path.
#[must_use = "the security context is cleared as soon as the guard is dropped"]
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        SecurityContext::clear();
    }
}
