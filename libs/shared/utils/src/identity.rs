use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// Resolves the acting user's role. Authorization decisions are made by the
/// HTTP layer; the scheduling services never see a `User`.
pub trait IdentityGateway: Send + Sync {
    fn resolve_role(&self, user: &User) -> Result<Role, AppError>;
}

/// Reads the `role` claim issued by the auth provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsIdentity;

impl IdentityGateway for ClaimsIdentity {
    fn resolve_role(&self, user: &User) -> Result<Role, AppError> {
        let claim = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Token carries no role".to_string()))?;

        claim
            .parse::<Role>()
            .map_err(AppError::Forbidden)
    }
}

/// True when `user` acts for `owner_id`, either as that professional or as an admin.
pub fn acts_for(identity: &dyn IdentityGateway, user: &User, owner_id: &str) -> Result<bool, AppError> {
    Ok(match identity.resolve_role(user)? {
        Role::Admin => true,
        Role::Professional => user.id == owner_id,
        Role::Patient => false,
    })
}
