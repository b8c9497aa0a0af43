use thiserror::Error;
use url::Url;

use validator::ValidationError;

/// Longest long URL accepted; keeps stored rows inside Postgres index limits
pub const MAX_LONG_URL_LEN: usize = 2048;

/// Why a candidate long URL was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("Invalid URL format")]
    Malformed,
    #[error("URL must not contain control characters")]
    ControlCharacters,
    #[error("URL must be at most 2048 characters")]
    TooLong,
    #[error("URL scheme must be http or https")]
    UnsupportedScheme,
    #[error("URL must have a host")]
    MissingHost,
    #[error("URL already shortened")]
    AlreadyShortened,
}

impl UrlRejection {
    fn code(&self) -> &'static str {
        match self {
            UrlRejection::Malformed => "url_malformed",
            UrlRejection::ControlCharacters => "url_control_chars",
            UrlRejection::TooLong => "url_length",
            UrlRejection::UnsupportedScheme => "url_scheme",
            UrlRejection::MissingHost => "url_host",
            UrlRejection::AlreadyShortened => "url_already_shortened",
        }
    }
}

/// Accepts absolute http(s) URLs with a host that do not point at one of `own_bases`' redirect paths
pub fn check_long_url(candidate: &str, own_bases: &[Url]) -> Result<Url, UrlRejection> {
    let candidate = candidate.trim();
    if candidate.len() > MAX_LONG_URL_LEN {
        return Err(UrlRejection::TooLong);
    }
    // The parser strips tabs and newlines, but they cannot go back out in a Location header
    if candidate.chars().any(char::is_control) {
        return Err(UrlRejection::ControlCharacters);
    }

    let url = Url::parse(candidate).map_err(|_| UrlRejection::Malformed)?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlRejection::UnsupportedScheme);
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlRejection::MissingHost),
    }

    if own_bases.iter().any(|base| points_at_redirects(&url, base)) {
        return Err(UrlRejection::AlreadyShortened);
    }

    Ok(url)
}

// Same host and effective port as `base`, and a path under `{base path}/r/`
fn points_at_redirects(url: &Url, base: &Url) -> bool {
    let same_host = match (url.host_str(), base.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if !same_host || url.port_or_known_default() != base.port_or_known_default() {
        return false;
    }

    let prefix = format!("{}/r/", base.path().trim_end_matches('/'));
    url.path().starts_with(&prefix)
}

/// Validates that a URL string is properly formatted and uses http/https
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    check_long_url(url_str, &[]).map(|_| ()).map_err(|rejection| {
        let mut err = ValidationError::new(rejection.code());
        err.message = Some(rejection.to_string().into());
        err
    })
}

/// Validates a `#RRGGBB` / `RRGGBB` color; blank means "use the default"
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let trimmed = color.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut err = ValidationError::new("hex_color");
        err.message = Some("Color must be a hex value like #1A73E8".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bases() -> Vec<Url> {
        vec![
            Url::parse("http://localhost:8080").unwrap(),
            Url::parse("https://go.example.org").unwrap(),
        ]
    }

    #[test]
    fn test_validate_url() {
        // Valid URLs
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/path?query=value").is_ok());
        assert!(validate_url("https://example.com/a/b?x=1").is_ok());

        // Invalid URLs
        assert!(validate_url("not-a-url").is_err());
        assert!(validate_url("example.com/no-scheme").is_err());
        assert!(validate_url("ftp://example.com").is_err()); // Not http/https
        assert!(validate_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(check_long_url("::", &[]), Err(UrlRejection::Malformed));
        assert_eq!(
            check_long_url("file:///etc/passwd", &[]),
            Err(UrlRejection::UnsupportedScheme)
        );
        assert_eq!(check_long_url("http://", &[]), Err(UrlRejection::Malformed));
        assert_eq!(
            check_long_url("https://example.com/a\nb", &[]),
            Err(UrlRejection::ControlCharacters)
        );
        assert_eq!(
            check_long_url("https://example.com/\ta", &[]),
            Err(UrlRejection::ControlCharacters)
        );
        assert_eq!(
            check_long_url("https://example.com/\u{7f}", &[]),
            Err(UrlRejection::ControlCharacters)
        );
        // Surrounding whitespace is trimmed, not rejected
        assert!(check_long_url("  https://example.com/a\n", &[]).is_ok());
    }

    #[test]
    fn test_length_limit() {
        let base = "https://example.com/?q=";
        let at_limit = format!("{}{}", base, "a".repeat(MAX_LONG_URL_LEN - base.len()));
        assert!(check_long_url(&at_limit, &[]).is_ok());

        let over = format!("{}b", at_limit);
        assert_eq!(check_long_url(&over, &[]), Err(UrlRejection::TooLong));
    }

    #[test]
    fn test_self_referential_urls_are_rejected() {
        let own = bases();
        assert_eq!(
            check_long_url("http://localhost:8080/r/AbCdEf12", &own),
            Err(UrlRejection::AlreadyShortened)
        );
        assert_eq!(
            check_long_url("https://GO.example.org/r/xyz", &own),
            Err(UrlRejection::AlreadyShortened)
        );
        // https default port matches an explicit :443
        assert_eq!(
            check_long_url("https://go.example.org:443/r/xyz", &own),
            Err(UrlRejection::AlreadyShortened)
        );
    }

    #[test]
    fn test_own_host_outside_redirect_path_is_allowed() {
        let own = bases();
        assert!(check_long_url("https://go.example.org/about", &own).is_ok());
        assert!(check_long_url("http://localhost:3000/r/AbCdEf12", &own).is_ok());
        assert!(check_long_url("https://example.org/r/AbCdEf12", &own).is_ok());
    }

    #[test]
    fn test_validate_hex_color() {
        assert!(validate_hex_color("#1a73e8").is_ok());
        assert!(validate_hex_color("FFFFFF").is_ok());
        assert!(validate_hex_color("").is_ok());

        assert!(validate_hex_color("#fff").is_err());
        assert!(validate_hex_color("#gggggg").is_err());
        assert!(validate_hex_color("red").is_err());
    }
}
