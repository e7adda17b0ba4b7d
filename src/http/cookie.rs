//! Cookie reading and construction from the configured defaults.

use axum::http::{header, HeaderMap};
use cookie::time::{Date, Duration, Month, OffsetDateTime, Time};
use cookie::{Cookie, SameSite};

use crate::config::{CookieConfig, SameSitePolicy};

/// Build a cookie: `name` and `value` over the configured defaults.
pub fn build_cookie(defaults: &CookieConfig, name: &str, value: &str) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .secure(defaults.secure)
        .http_only(defaults.http_only)
        .same_site(same_site(defaults.same_site));

    if let Some(path) = &defaults.path {
        builder = builder.path(path.clone());
    }
    if let Some(domain) = &defaults.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(secs) = defaults.max_age_secs {
        builder = builder.max_age(Duration::seconds(secs));
    }
    if let Some(secs) = defaults.expires_in_secs {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        if let Some(at) = expiry_after(secs) {
            builder = builder.expires(at);
        }
    }

    builder.build()
}

/// `secs` from now, capped at the last day of year 9999.
fn expiry_after(secs: i64) -> Option<OffsetDateTime> {
    let latest = Date::from_calendar_date(9999, Month::December, 31)
        .ok()?
        .with_time(Time::MIDNIGHT)
        .assume_utc();
    let at = OffsetDateTime::now_utc()
        .checked_add(Duration::seconds(secs))
        .unwrap_or(latest);
    Some(at.min(latest))
}

/// All cookies sent in `Cookie` request headers. Malformed pairs are skipped.
pub fn request_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_string()))
        .filter_map(Result::ok)
        .collect()
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn overlays_name_and_value_on_defaults() {
        let cookie = build_cookie(&CookieConfig::default(), "SESSIONID", "123");

        assert_eq!(cookie.name(), "SESSIONID");
        assert_eq!(cookie.value(), "123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("localhost"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert!(cookie.expires_datetime().is_some());
        assert!(cookie.max_age().is_none());
    }

    #[test]
    fn far_future_expiry_is_capped() {
        let defaults = CookieConfig {
            expires_in_secs: Some(1_000_000_000_000),
            ..CookieConfig::default()
        };
        let cookie = build_cookie(&defaults, "SESSIONID", "123");

        let expires = cookie.expires_datetime().unwrap();
        assert_eq!(expires.year(), 9999);
        assert!(cookie.to_string().contains("Expires="));

        let defaults = CookieConfig {
            expires_in_secs: Some(u64::MAX),
            ..CookieConfig::default()
        };
        let cookie = build_cookie(&defaults, "SESSIONID", "123");
        assert_eq!(cookie.expires_datetime().map(|t| t.year()), Some(9999));
    }

    #[test]
    fn optional_attributes_are_omitted() {
        let defaults = CookieConfig {
            path: None,
            domain: None,
            expires_in_secs: None,
            max_age_secs: Some(60),
            secure: false,
            http_only: false,
            same_site: SameSitePolicy::Strict,
        };
        let cookie = build_cookie(&defaults, "a", "b");

        assert_eq!(cookie.path(), None);
        assert_eq!(cookie.domain(), None);
        assert!(cookie.expires().is_none());
        assert_eq!(cookie.max_age(), Some(Duration::seconds(60)));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn parses_request_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.append(header::COOKIE, HeaderValue::from_static("c=3"));

        let cookies = request_cookies(&headers);
        let pairs: Vec<_> = cookies.iter().map(|c| (c.name(), c.value())).collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "2"), ("c", "3")]);
    }
}
