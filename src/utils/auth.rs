//! Authentication utilities for API requests

use reqwest::header::AUTHORIZATION;

/// Attach the bearer credential to an HTTP request.
pub fn add_auth_headers(request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    request.header(AUTHORIZATION, format!("Bearer {api_key}"))
}
