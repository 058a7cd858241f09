//! Path extractor for typed numeric ids.
//!
//! `Path<ScenarioId>` would reject a malformed segment with axum's plain-text
//! rejection; `PathId<T>` keeps the JSON error shape used everywhere else.

use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use chime_core::{MemberId, ScenarioId};

use crate::error::ApiError;

/// An id type that can be parsed from a single path segment.
pub trait PathIdType: FromStr + Send {
    /// Parameter name used in error messages.
    const PARAM_NAME: &'static str;
}

impl PathIdType for ScenarioId {
    const PARAM_NAME: &'static str = "scenario_id";
}

impl PathIdType for MemberId {
    const PARAM_NAME: &'static str = "member_id";
}

/// Extractor for a single typed id path parameter.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_one(PathId(scenario_id): PathId<ScenarioId>) -> ApiResult<impl IntoResponse> {
///     // scenario_id is ScenarioId, not String
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: PathIdType>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: PathIdType,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_format(T::PARAM_NAME, "a numeric id"))?;

        raw.parse::<T>()
            .map(PathId)
            .map_err(|_| ApiError::invalid_format(T::PARAM_NAME, "a numeric id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn echo(PathId(scenario_id): PathId<ScenarioId>) -> String {
        scenario_id.to_string()
    }

    fn router() -> Router {
        Router::new().route("/scenarios/:scenario_id", get(echo))
    }

    #[tokio::test]
    async fn test_numeric_segment_is_extracted() {
        let response = router()
            .oneshot(Request::get("/scenarios/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_segment_is_invalid_format() {
        let response = router()
            .oneshot(Request::get("/scenarios/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
