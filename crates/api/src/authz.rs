//! API-side ownership guard.
//!
//! Edit and delete handlers call this before touching the store; the owner is
//! looked up fresh on each call.

use agora_auth::ResourceRef;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::IdentityContext;

/// Fail with `403` unless the caller currently owns `resource`.
///
/// A resource that does not exist is refused the same way.
pub async fn require_owner(
    services: &AppServices,
    caller: &IdentityContext,
    resource: ResourceRef,
) -> Result<(), ApiError> {
    services
        .gate
        .authorize_edit(caller.identity(), resource)
        .await
        .map_err(ApiError::from)
}
