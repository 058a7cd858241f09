//! Member identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the resolved member
//! id in the `X-Member-Id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chime_core::MemberId;

use crate::error::ApiError;

/// Header carrying the authenticated member id.
pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// The member on whose behalf the request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberContext {
    pub member_id: MemberId,
}

impl MemberContext {
    fn from_header(value: Option<&str>) -> Result<Self, ApiError> {
        let raw = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing member identity"))?;

        let member_id = raw
            .parse::<MemberId>()
            .map_err(|_| ApiError::unauthorized("Invalid member identity"))?;
        if member_id.get() <= 0 {
            return Err(ApiError::unauthorized("Invalid member identity"));
        }

        Ok(Self { member_id })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MemberContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(MEMBER_ID_HEADER)
            .map(|v| v.to_str().map_err(|_| ApiError::unauthorized("Invalid member identity")))
            .transpose()?;
        Self::from_header(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_valid_header() {
        let ctx = MemberContext::from_header(Some(" 17 ")).unwrap();
        assert_eq!(ctx.member_id, MemberId::new(17));
    }

    #[test]
    fn test_missing_or_blank_header_is_unauthorized() {
        for value in [None, Some(""), Some("   ")] {
            let err = MemberContext::from_header(value).unwrap_err();
            assert_eq!(err.code, ErrorCode::Unauthorized);
        }
    }

    #[test]
    fn test_non_numeric_or_non_positive_is_unauthorized() {
        for value in ["abc", "0", "-3"] {
            let err = MemberContext::from_header(Some(value)).unwrap_err();
            assert_eq!(err.code, ErrorCode::Unauthorized);
        }
    }
}
