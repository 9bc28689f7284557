use anyhow::Context;
use axum::http::{header, HeaderMap, HeaderValue};
use time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};

pub const SESSION_COOKIE: &str = "session";
/// Cookie carrying the id of the server-side session that holds flash messages.
pub const FLASH_COOKIE: &str = "flash";

/// Value of the cookie `name` sent with the request. Surrounding quotes are
/// stripped.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| Cookie::split_parse(s))
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value_trimmed().to_string())
}

/// Session token from the `session` cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = request_cookie(headers, SESSION_COOKIE).filter(|t| !t.is_empty()) {
        return Some(token);
    }
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

pub fn session_cookie(token: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Expires the session cookie in the browser.
pub fn session_removal() -> Cookie<'static> {
    let mut cookie = session_cookie(String::new(), Duration::ZERO, false);
    cookie.make_removal();
    cookie
}

pub fn set_cookie_header(cookie: &Cookie<'_>) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .with_context(|| format!("encode Set-Cookie for {}", cookie.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; session=\"tok\"; flash=abc"),
        );
        assert_eq!(request_cookie(&headers, "session").as_deref(), Some("tok"));
        assert_eq!(request_cookie(&headers, "flash").as_deref(), Some("abc"));
        assert_eq!(request_cookie(&headers, "missing"), None);
    }

    #[test]
    fn reads_across_several_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("session=second"));
        assert_eq!(request_cookie(&headers, "session").as_deref(), Some("second"));
    }

    #[test]
    fn session_token_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("tok".into(), Duration::minutes(1), true);
        let header = set_cookie_header(&cookie).unwrap();
        let s = header.to_str().unwrap();
        assert!(s.starts_with("session=tok"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Lax"));
        assert!(s.contains("Secure"));
        assert!(s.contains("Path=/"));
        assert!(s.contains("Max-Age=60"));
    }

    #[test]
    fn removal_empties_and_expires() {
        let s = set_cookie_header(&session_removal()).unwrap();
        let s = s.to_str().unwrap();
        assert!(s.starts_with("session=;"));
        assert!(s.contains("Max-Age=0"));
    }

    #[test]
    fn unencodable_value_is_an_error() {
        let cookie = session_cookie("bad\nvalue".into(), Duration::minutes(1), false);
        assert!(set_cookie_header(&cookie).is_err());
    }
}
