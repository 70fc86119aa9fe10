//! Base URL handling for the API endpoint.

/// Strip trailing slashes so endpoint paths can be appended verbatim.
///
/// ```
/// use ponder::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
/// assert_eq!(normalize_base_url("http://localhost:8080//"), "http://localhost:8080");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use ponder::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.openai.com/v1/", "/responses"),
///     "https://api.openai.com/v1/responses"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalize_base_url(base_url), endpoint)
}

/// Accepts only absolute `http` or `https` URLs with a host.
pub fn validate_base_url(base_url: &str) -> Result<String, String> {
    let normalized = normalize_base_url(base_url);
    let rest = normalized
        .strip_prefix("https://")
        .or_else(|| normalized.strip_prefix("http://"))
        .ok_or_else(|| format!("Base URL must start with http:// or https://: {base_url}"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("Base URL is missing a host: {base_url}"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_only_trailing_slashes() {
        assert_eq!(
            normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            normalize_base_url("  https://api.example.com/v1/// "),
            "https://api.example.com/v1"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_never_doubles_slashes() {
        for (base, endpoint) in [
            ("https://api.example.com/v1", "responses"),
            ("https://api.example.com/v1/", "responses"),
            ("https://api.example.com/v1", "/responses"),
            ("https://api.example.com/v1///", "///responses"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "https://api.example.com/v1/responses",
                "base={base:?} endpoint={endpoint:?}"
            );
        }
    }

    #[test]
    fn validate_requires_scheme_and_host() {
        assert_eq!(
            validate_base_url("http://localhost:11434/v1/").as_deref(),
            Ok("http://localhost:11434/v1")
        );
        assert!(validate_base_url("api.openai.com/v1").is_err());
        assert!(validate_base_url("https://").is_err());
        assert!(validate_base_url("ftp://example.com").is_err());
    }
}
