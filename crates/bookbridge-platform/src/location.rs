//! Derive the API/socket endpoint from the page the app is served from.

use bookbridge_types::{ChatError, Result, config::EndpointConfig};

/// Same host as the page; `https:` pages get `wss`/`https`.
pub fn endpoint_from_location(api_base: &str) -> Result<EndpointConfig> {
    let location = gloo_utils::window().location();
    let host = location
        .host()
        .map_err(|e| ChatError::JsInterop(format!("location.host: {:?}", e)))?;
    let protocol = location
        .protocol()
        .map_err(|e| ChatError::JsInterop(format!("location.protocol: {:?}", e)))?;

    if host.is_empty() {
        return Err(ChatError::Config("Page has no host".to_string()));
    }

    Ok(EndpointConfig {
        host,
        secure: protocol == "https:",
        api_base: api_base.to_string(),
    })
}

/// A query parameter of the page URL, e.g. `book_id` when the chat page is
/// opened from a book's "Contact seller" button.
pub fn query_param(name: &str) -> Option<String> {
    let search = gloo_utils::window().location().search().ok()?;
    let params = web_sys::UrlSearchParams::new_with_str(&search).ok()?;
    params.get(name).filter(|value| !value.trim().is_empty())
}

/// Leave the app for another marketplace page.
pub fn navigate(href: &str) -> Result<()> {
    gloo_utils::window()
        .location()
        .set_href(href)
        .map_err(|e| ChatError::JsInterop(format!("navigation failed: {:?}", e)))
}
