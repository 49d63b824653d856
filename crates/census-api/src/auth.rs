//! Request actor extraction.
//!
//! A request carrying `Authorization: Basic …` must present the admin
//! credentials and then acts as [`Role::Admin`]. Without credentials the
//! role is read from the [`ROLE_HEADER`] set by the portal front end, and
//! defaults to [`Role::Department`]. Claiming `admin` that way is refused.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use census_core::{ledger::Role, store::CensusStore};

use crate::{ApiState, error::ApiError};

pub const ROLE_HEADER: &str = "x-census-role";

/// Admin credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub role: Role,
}

impl Actor {
  /// Fails with 403 unless the actor is an admin.
  pub fn require_admin(&self) -> Result<(), ApiError> {
    if self.role.is_privileged() {
      Ok(())
    } else {
      Err(ApiError::Forbidden(format!("{} may not do this", self.role)))
    }
  }
}

/// Verify Basic credentials against the admin account.
pub fn verify_admin(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) =
    creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash =
    PasswordHash::new(&config.password_hash).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(())
}

fn claimed_role(headers: &HeaderMap) -> Result<Role, ApiError> {
  let Some(value) = headers.get(ROLE_HEADER) else {
    return Ok(Role::Department);
  };
  let raw = value
    .to_str()
    .map_err(|_| ApiError::BadRequest(format!("invalid {ROLE_HEADER} header")))?;
  raw
    .trim()
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("unknown role {raw:?}")))
}

impl<S> FromRequestParts<ApiState<S>> for Actor
where
  S: CensusStore,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    if parts.headers.contains_key(header::AUTHORIZATION) {
      verify_admin(&parts.headers, &state.auth)?;
      return Ok(Actor { role: Role::Admin });
    }

    let role = claimed_role(&parts.headers)?;
    if role.is_privileged() {
      return Err(ApiError::Unauthorized);
    }
    Ok(Actor { role })
  }
}
