use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use agora_core::{AnswerId, QuestionId, UserId};

use crate::Identity;

/// A resource that has a fixed owner (its creator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Question(QuestionId),
    Answer(AnswerId),
}

impl core::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResourceRef::Question(id) => write!(f, "question:{id}"),
            ResourceRef::Answer(id) => write!(f, "answer:{id}"),
        }
    }
}

/// Looks up the *current* owner of a resource in the system of record.
///
/// `Ok(None)` means the resource does not exist (yet, or any more).
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn resolve_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, Self::Error>;
}

#[async_trait]
impl<R> OwnershipResolver for Arc<R>
where
    R: OwnershipResolver + ?Sized,
{
    type Error = R::Error;

    async fn resolve_owner(&self, resource: ResourceRef) -> Result<Option<UserId>, Self::Error> {
        (**self).resolve_owner(resource).await
    }
}

#[derive(Debug, Error)]
pub enum AuthzError<E> {
    /// The caller does not own the resource, or it does not exist.
    /// Both cases are reported identically.
    #[error("forbidden: caller may not modify {0}")]
    Denied(ResourceRef),

    #[error("ownership lookup failed: {0}")]
    Lookup(E),
}

/// The ownership predicate shared by every edit decision.
pub fn is_owner(identity: &Identity, owner: UserId) -> bool {
    identity.user_id() == owner
}

/// Decides whether a verified identity may mutate a resource.
///
/// - No caching: the owner is resolved on every call.
/// - No side effects.
/// - Missing resources are never editable.
#[derive(Debug, Clone)]
pub struct AuthorizationGate<R> {
    resolver: R,
}

impl<R: OwnershipResolver> AuthorizationGate<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub async fn can_edit(&self, identity: &Identity, resource: ResourceRef) -> Result<bool, R::Error> {
        let owner = self.resolver.resolve_owner(resource).await?;
        let allowed = owner.is_some_and(|owner| is_owner(identity, owner));
        debug!(%identity, %resource, found = owner.is_some(), allowed, "edit decision");
        Ok(allowed)
    }

    /// Like [`can_edit`](Self::can_edit), with a negative decision as an error.
    pub async fn authorize_edit(
        &self,
        identity: &Identity,
        resource: ResourceRef,
    ) -> Result<(), AuthzError<R::Error>> {
        match self.can_edit(identity, resource).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthzError::Denied(resource)),
            Err(e) => Err(AuthzError::Lookup(e)),
        }
    }
}
