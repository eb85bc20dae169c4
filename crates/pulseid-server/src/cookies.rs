//! The single source of session cookie names and attributes. Every endpoint
//! that sets or clears a session goes through these helpers, so attribute
//! drift between login, refresh, and logout is impossible.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use pulseid_core::config::CookieConfig;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn access_cookie(token: String, config: &CookieConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(ACCESS_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(config.secure);
    cookie
}

// The refresh cookie is sent cross-site so a separately hosted frontend can
// drive transparent refresh. SameSite=None requires Secure in browsers, which
// the production config enables.
fn refresh_cookie(token: String, config: &CookieConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::None);
    cookie.set_secure(config.secure);
    cookie
}

/// Install both session cookies.
pub fn set_session(
    jar: CookieJar,
    access_token: String,
    refresh_token: String,
    config: &CookieConfig,
) -> CookieJar {
    jar.add(access_cookie(access_token, config))
        .add(refresh_cookie(refresh_token, config))
}

/// Replace only the access cookie (transparent refresh path).
pub fn set_access(jar: CookieJar, access_token: String, config: &CookieConfig) -> CookieJar {
    jar.add(access_cookie(access_token, config))
}

/// Expire both session cookies. Removal must match the path they were set
/// with or browsers keep the originals.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    let mut access = Cookie::new(ACCESS_COOKIE, "");
    access.set_path("/");
    let mut refresh = Cookie::new(REFRESH_COOKIE, "");
    refresh.set_path("/");
    jar.remove(access).remove(refresh)
}
