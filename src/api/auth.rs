// =============================================================================
// Bearer Token Authentication
// =============================================================================
//
// Guards the mutating endpoints. The expected token comes from
// `SCANNER_ADMIN_TOKEN`, read once at startup into `AppState`. When no token
// is configured every guarded request is refused. Comparison is constant
// time.
// =============================================================================

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

pub const ADMIN_TOKEN_ENV: &str = "SCANNER_ADMIN_TOKEN";

/// Read the admin token from the environment; empty counts as unset.
pub fn admin_token_from_env() -> Option<String> {
    std::env::var(ADMIN_TOKEN_ENV)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Compare two byte slices without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Returned when authentication fails.
#[derive(Debug, PartialEq)]
pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, axum::Json(body)).into_response()
    }
}

/// Check `Authorization: Bearer <token>` against `expected`.
pub fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AuthRejection> {
    let Some(expected) = expected else {
        warn!("{ADMIN_TOKEN_ENV} is not set, refusing authenticated request");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Server authentication not configured",
        });
    };

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        warn!("Missing or malformed Authorization header");
        return Err(AuthRejection {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing or invalid authorization token",
        });
    };

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        warn!("Invalid admin token presented");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Invalid authorization token",
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
