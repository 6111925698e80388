//! Backend endpoint paths and URL joining.

pub const SEND_ENDPOINT: &str = "api/chat/send";
pub const HISTORY_ENDPOINT: &str = "api/chat/history";
pub const NEW_CHAT_ENDPOINT: &str = "api/chat/new";
pub const CHAT_ENDPOINT: &str = "api/chat";
pub const LOGIN_ENDPOINT: &str = "api/auth/login";
pub const LOGOUT_ENDPOINT: &str = "api/auth/logout";
pub const ME_ENDPOINT: &str = "api/auth/me";
pub const MODELS_ENDPOINT: &str = "api/models";

/// Strip trailing slashes so endpoint joins never produce `//`.
///
/// ```
/// use chatline::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path.
///
/// ```
/// use chatline::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/", "/api/chat/send"),
///     "http://localhost:8000/api/chat/send"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalize_base_url(base_url), endpoint)
}

/// URL for a resource nested under an endpoint, e.g. `api/chat/{id}`.
pub fn resource_url(base_url: &str, endpoint: &str, segments: &[&str]) -> String {
    let mut url = construct_api_url(base_url, endpoint);
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim_matches('/'));
    }
    url
}
