//! Extractors resolving the caller from the trusted identity headers.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::{dto::identity::CurrentUser, error::AppError};

/// Header carrying the caller id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller display name.
pub const USER_NAME_HEADER: &str = "x-user-name";
/// Header carrying the caller email.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn identify(headers: &HeaderMap) -> Option<CurrentUser> {
    let id = header(headers, USER_ID_HEADER)?;
    Some(CurrentUser {
        id,
        name: header(headers, USER_NAME_HEADER),
        email: header(headers, USER_EMAIL_HEADER),
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identify(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("missing user identity header `X-User-Id`".into())
        })
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(identify(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn identity_needs_a_non_blank_id() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Jo"));
        assert!(identify(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(identify(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-7"));
        let user = identify(&headers).unwrap();
        assert_eq!(user.id, "u-7");
        assert_eq!(user.name.as_deref(), Some("Jo"));
        assert_eq!(user.email, None);
    }
}
