//! JSON body extractor with the API error envelope

use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use super::response::{ApiError, api_error, error_codes};

/// `Json<T>` whose rejections (bad syntax, missing fields, wrong types,
/// missing content type) become `400` with `{code, msg}` instead of axum's
/// plain-text `4xx`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            api_error(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_PARAMETER,
                format!("Invalid JSON: {}", e.body_text()),
            )
        })?;
        Ok(JsonBody(value))
    }
}
