use serde::Serialize;

use agora_core::UserId;

/// A verified principal.
///
/// There is no public constructor: the only way to obtain an `Identity` is
/// [`TokenService::validate`](crate::TokenService::validate), so a value of this
/// type always means "a token signed with our key named this user".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    user_id: UserId,
}

impl Identity {
    pub(crate) fn verified(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "user:{}", self.user_id)
    }
}
