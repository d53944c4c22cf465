//! Cookie builders for the session token.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Cookie name for the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Attributes applied to the session cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// `Domain` attribute; host-only cookie when `None`.
    pub domain: Option<String>,
    /// `Secure` attribute. Off for plain-HTTP deployments.
    pub secure: bool,
    /// Cookie Max-Age in seconds; matches the session TTL.
    pub max_age_secs: u64,
}

fn base_cookie(value: String, options: &CookieOptions) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(options.secure)
        .same_site(SameSite::Lax)
        .build();
    if let Some(domain) = &options.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Set the session cookie on the jar.
///
/// ```
/// use axum_extra::extract::cookie::CookieJar;
/// use tabi_auth_types::cookie::{set_session_cookie, CookieOptions, SESSION_COOKIE};
///
/// let options = CookieOptions { domain: None, secure: false, max_age_secs: 900 };
/// let jar = set_session_cookie(CookieJar::new(), "token_value".to_string(), &options);
/// let cookie = jar.get(SESSION_COOKIE).unwrap();
/// assert_eq!(cookie.value(), "token_value");
/// assert_eq!(cookie.path(), Some("/"));
/// assert_eq!(cookie.domain(), None);
/// assert_eq!(cookie.max_age(), Some(time::Duration::seconds(900)));
/// assert!(cookie.http_only().unwrap_or(false));
/// assert!(!cookie.secure().unwrap_or(false));
/// ```
pub fn set_session_cookie(jar: CookieJar, value: String, options: &CookieOptions) -> CookieJar {
    let mut cookie = base_cookie(value, options);
    cookie.set_max_age(Duration::seconds(options.max_age_secs as i64));
    jar.add(cookie)
}

/// Clear the session cookie by setting Max-Age to 0.
///
/// ```
/// use axum_extra::extract::cookie::CookieJar;
/// use tabi_auth_types::cookie::{
///     clear_session_cookie, set_session_cookie, CookieOptions, SESSION_COOKIE,
/// };
///
/// let options = CookieOptions {
///     domain: Some("example.com".to_string()),
///     secure: true,
///     max_age_secs: 900,
/// };
/// let jar = set_session_cookie(CookieJar::new(), "t".to_string(), &options);
/// let jar = clear_session_cookie(jar, &options);
/// let cookie = jar.get(SESSION_COOKIE).unwrap();
/// assert_eq!(cookie.value(), "");
/// assert_eq!(cookie.domain(), Some("example.com"));
/// assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
/// ```
pub fn clear_session_cookie(jar: CookieJar, options: &CookieOptions) -> CookieJar {
    let mut cookie = base_cookie(String::new(), options);
    cookie.set_max_age(Duration::ZERO);
    jar.add(cookie)
}
