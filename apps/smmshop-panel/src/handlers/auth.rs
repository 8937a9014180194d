use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use smmshop_shared::api::ErrorBody;
use tracing::warn;

use crate::AppState;

pub const BOT_TOKEN_HEADER: &str = "X-Bot-Token";
pub const ADMIN_KEY_HEADER: &str = "X-API-Key";

fn header_matches(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    let Some(given) = headers.get(name).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    !expected.is_empty() && constant_time_eq(given.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Guards the bot API with the shared `BOT_API_TOKEN`.
pub async fn bot_auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !header_matches(req.headers(), BOT_TOKEN_HEADER, &state.config.bot_api_token) {
        warn!("Rejected bot API call to {}", req.uri().path());
        return unauthorized("Invalid bot token");
    }
    next.run(req).await
}

/// Guards the admin API with `ADMIN_API_KEY`.
pub async fn admin_auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !header_matches(req.headers(), ADMIN_KEY_HEADER, &state.config.admin_api_key) {
        warn!("Rejected admin API call to {}", req.uri().path());
        return unauthorized("Invalid API key");
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert!(!header_matches(&headers, ADMIN_KEY_HEADER, "secret"));
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(header_matches(&headers, ADMIN_KEY_HEADER, "secret"));
        assert!(!header_matches(&headers, ADMIN_KEY_HEADER, "secret2"));
        // an unset key never authorizes anything
        headers.insert(BOT_TOKEN_HEADER, HeaderValue::from_static(""));
        assert!(!header_matches(&headers, BOT_TOKEN_HEADER, ""));
    }
}
