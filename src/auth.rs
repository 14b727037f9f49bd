use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::Error as JwtError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    notify::{Notice, NoticeHub},
    session::{ACCESS_TOKEN_COOKIE, RequestCookies},
};

/// Claims
///
/// The payload of a Supabase-issued access token. The token is signed with the
/// project's shared secret and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID in the external auth service.
    pub sub: Uuid,
    /// Expiration timestamp; an expired token never authenticates a request.
    pub exp: usize,
    /// The user's email, when the auth service includes it.
    #[serde(default)]
    pub email: Option<String>,
}

/// decode_access_token
///
/// Validates an access token against the shared secret, enforcing expiry.
/// Shared by the Session Provider (cookie path) and the `CurrentUser`
/// extractor (bearer path) so both agree on what "valid" means.
pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(token, &decoding_key, &validation).map(|data| data.claims)
}

/// CurrentUser
///
/// The resolved identity of an authenticated API request, plus the raw access
/// token to forward to the external finance API on the user's behalf.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
}

/// CurrentUser Extractor Implementation
///
/// Makes `CurrentUser` usable as a handler argument for the JSON API routes.
/// The token is taken from the `Authorization: Bearer` header when present,
/// falling back to the session cookie, and validated locally.
///
/// Rejection: 401 Unauthorized. Because the rejection fires before the handler
/// runs, a missing or expired token short-circuits the request with no call to
/// any external service; the failure is surfaced to the UI as a "session
/// required" notice rather than an error page.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
    NoticeHub: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let notices = NoticeHub::from_ref(state);

        // Bearer header first, session cookie as the fallback.
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = match bearer {
            Some(token) => Some(token),
            None => RequestCookies::from_headers(&parts.headers)
                .get(ACCESS_TOKEN_COOKIE)
                .map(str::to_string),
        };

        let Some(token) = token else {
            notices.push(session_required_notice());
            return Err(StatusCode::UNAUTHORIZED);
        };

        match decode_access_token(&config.jwt_secret, &token) {
            Ok(claims) => Ok(CurrentUser {
                id: claims.sub,
                email: claims.email,
                access_token: token,
            }),
            Err(_) => {
                // Expired, malformed, or wrongly signed: all read the same to
                // the caller.
                notices.push(session_required_notice());
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

fn session_required_notice() -> Notice {
    Notice::new(
        "Sesión requerida",
        "Inicia sesión nuevamente para continuar.",
    )
}
