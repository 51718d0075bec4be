//! Bearer-token authentication middleware.
//!
//! Services apply this on their authenticated route groups via
//! `from_fn_with_state`. Validated claims are stored in request extensions
//! for the `AuthUser` extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, Secret};

use crate::error::AppError;
use crate::utils::jwt::{self, Claims, Role};

/// JWT validation settings shared by all services.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
}

pub async fn jwt_auth_middleware<S>(
    State(state): State<S>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: AsRef<JwtConfig> + Clone + Send + Sync + 'static,
{
    let config: &JwtConfig = state.as_ref();

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::AuthError(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = jwt::validate_token(config.secret.expose_secret(), token)
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid or expired token")))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated user's claims.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Reject with 403 unless the caller holds one of the given roles.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.0.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Role '{}' is not permitted to perform this action",
                self.0.role.as_str()
            )))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<Claims>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth claims missing from request extensions"
            ))
        })?;

        Ok(AuthUser(claims))
    }
}
