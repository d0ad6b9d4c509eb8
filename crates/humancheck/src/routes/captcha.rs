//! CAPTCHA rendering, image, and verification endpoints.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use humancheck_common::{ChallengeResponse, HumanCheckError, VerifyResponse};
use std::collections::HashMap;

use super::ApiError;
use crate::state::AppState;

/// Render a fresh challenge and bind it into the caller's session
pub async fn get_challenge(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ChallengeResponse>), ApiError> {
    let cookie = jar.get(state.sessions.cookie_name()).map(|c| c.value().to_string());
    let mut session = state.sessions.load(cookie.as_deref()).await?;

    let rendered = state.field.render(&mut session).await?;
    state.sessions.save(&session).await?;

    tracing::debug!(key = %rendered.key, "Issued CAPTCHA challenge");

    let jar = jar.add(state.sessions.cookie(&session));
    Ok((
        jar,
        Json(ChallengeResponse {
            key: rendered.key,
            image_url: rendered.image_url,
            fields: rendered.fields,
        }),
    ))
}

/// Validate a submitted form against the caller's session
pub async fn verify_challenge(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<HashMap<String, String>>,
) -> Result<(StatusCode, Json<VerifyResponse>), ApiError> {
    let cookie = jar.get(state.sessions.cookie_name()).map(|c| c.value().to_string());
    let session = state.sessions.load(cookie.as_deref()).await?;

    let submission = state.field.submission(&form);
    match state.field.clean(&session, &submission) {
        Ok(()) => Ok((StatusCode::OK, Json(VerifyResponse::accepted()))),
        Err(err) => Ok((
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse::rejected(err.to_string())),
        )),
    }
}

/// Serve a challenge image exactly once
pub async fn render_once(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_word(&key) {
        return Err(HumanCheckError::NotFound.into());
    }

    let (_, png) = state.store.take(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}

fn is_word(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
