//! Tenant extraction from HTTP Basic credentials
//!
//! Only the username is used; it names the tenant. Password checking is
//! left to whatever sits in front of the gateway.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;

use msgate_core::domain::TenantId;

/// Reasons a request carries no usable tenant
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Missing credentials")]
    Missing,

    /// Header present but not valid Basic credentials
    #[error("Malformed credentials: {0}")]
    Malformed(String),

    /// Username is not a valid tenant id
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),
}

/// Returns the tenant named by the request's Basic auth username
pub fn basic_auth_tenant(headers: &HeaderMap) -> Result<TenantId, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::Malformed("non-ASCII header".to_string()))?;

    let (scheme, encoded) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::Malformed("missing scheme".to_string()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::Malformed(format!("unsupported scheme {scheme}")));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Malformed(e.to_string()))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| AuthError::Malformed("non-UTF-8".to_string()))?;

    let username = decoded.split_once(':').map_or(decoded.as_str(), |(u, _)| u);
    TenantId::new(username).map_err(|e| AuthError::InvalidTenant(e.to_string()))
}

#[cfg(test)]
mod tests {
    use hyper::header::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    fn basic(userpass: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(userpass)))
    }

    #[test]
    fn extracts_username() {
        let tenant = basic_auth_tenant(&basic("acme:token")).unwrap();
        assert_eq!(tenant.as_str(), "acme");
    }

    #[test]
    fn username_without_password_is_accepted() {
        assert_eq!(basic_auth_tenant(&basic("acme")).unwrap().as_str(), "acme");
    }

    #[test]
    fn missing_header() {
        assert_eq!(basic_auth_tenant(&HeaderMap::new()), Err(AuthError::Missing));
    }

    #[test]
    fn wrong_scheme_or_encoding() {
        assert!(matches!(
            basic_auth_tenant(&headers("Bearer abc")),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            basic_auth_tenant(&headers("Basic !!!")),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn empty_username_is_rejected() {
        assert!(matches!(
            basic_auth_tenant(&basic(":secret")),
            Err(AuthError::InvalidTenant(_))
        ));
    }
}
