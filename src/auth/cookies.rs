use std::time::Duration;

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "token";

fn attributes(production: bool) -> &'static str {
    // Cross-site frontends need SameSite=None, which browsers only accept with Secure.
    if production {
        "Path=/; HttpOnly; Secure; SameSite=None"
    } else {
        "Path=/; HttpOnly; SameSite=Strict"
    }
}

/// `Set-Cookie` value carrying the session token.
pub fn session_cookie(
    token: &str,
    max_age: Duration,
    production: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; {}; Max-Age={}",
        attributes(production),
        max_age.as_secs()
    ))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie(production: bool) -> HeaderValue {
    let value = format!("{SESSION_COOKIE_NAME}=; {}; Max-Age=0", attributes(production));
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("token=; Max-Age=0"))
}

/// Session token from the `token` cookie, or from `Authorization: Bearer`
/// for non-browser clients. Empty values count as absent.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else { continue };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().unwrap_or_default().trim();
            let val = parts.next().unwrap_or_default().trim();
            if key == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }

    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn cookie_attributes_follow_environment() {
        let week = Duration::from_secs(7 * 24 * 60 * 60);
        let dev = session_cookie("abc", week, false).unwrap();
        let dev = dev.to_str().unwrap();
        assert!(dev.starts_with("token=abc;"));
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Strict"));
        assert!(!dev.contains("Secure"));
        assert!(dev.contains("Max-Age=604800"));

        let prod = session_cookie("abc", week, true).unwrap();
        let prod = prod.to_str().unwrap();
        assert!(prod.contains("Secure"));
        assert!(prod.contains("SameSite=None"));
    }

    #[test]
    fn clearing_sets_zero_max_age() {
        let v = clear_session_cookie(false);
        let v = v.to_str().unwrap();
        assert!(v.starts_with("token=;"));
        assert!(v.contains("Max-Age=0"));
    }

    #[test]
    fn token_is_read_from_cookie_among_others() {
        let h = headers(&[("cookie", "theme=dark; token=abc.def.ghi; lang=en")]);
        assert_eq!(extract_session_token(&h).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_header_is_accepted() {
        let h = headers(&[("authorization", "Bearer xyz")]);
        assert_eq!(extract_session_token(&h).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        assert_eq!(extract_session_token(&headers(&[("cookie", "token=")])), None);
        assert_eq!(extract_session_token(&headers(&[("authorization", "Basic abc")])), None);
    }
}
