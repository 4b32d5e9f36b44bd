use agora_auth::Identity;
use agora_core::UserId;

/// Identity context for a request.
///
/// Inserted by the auth middleware after the bearer token verifies; handlers
/// read the caller from here and nowhere else.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    identity: Identity,
}

impl IdentityContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id()
    }
}
