pub mod context;
pub mod credentials;
pub mod identity;
pub mod outbound;
pub mod validator;

pub use context::{ContextGuard, SecurityContext};
pub use credentials::{
    ClientCredentials, ClientCredentialsExchange, CredentialCache, CredentialError, TokenExchange,
    UnconfiguredExchange,
};
pub use identity::{AuthenticatedIdentity, Identity};
pub use outbound::OutboundAuth;
pub use validator::{HttpTokenValidator, TokenValidator, Verdict};
