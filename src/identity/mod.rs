//! Identity model, bearer credentials and the authentication collaborator.
//! Keep the public surface thin and split implementation across sub-modules.

mod model;
mod credential;
mod provider;

pub use model::{Identity, IdentityDraft, IdentityPatch, Roles};
pub use credential::Credential;
pub use provider::{
    AuthBackend, AuthGrant, LoginRequest, MockAuthProvider, PasswordChange, RegisterRequest,
    mock_admin_identity, MOCK_ADMIN_PASSWORD, MOCK_ADMIN_USER,
};
