use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[allow(dead_code)]
    pub exp: usize,
}

/// Opaque authentication gate: every protected handler calls this first and
/// either proceeds with the authenticated principal or bails with 401.
pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user_id) = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Ok(user_id.to_string());
        }
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token.".to_string()))?;

    let Some(secret) = state.config.jwt_secret.as_deref() else {
        return Err(AppError::Dependency(
            "JWT_SECRET is not configured.".to_string(),
        ));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);

    let decoded = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| AppError::Unauthorized(format!("Invalid token: {error}")))?;

    Ok(decoded.claims.sub)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

    use super::bearer_token;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
