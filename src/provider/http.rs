//! Blocking JSON-over-HTTP plumbing shared by the hosted backends.

use std::time::Duration;

use super::error::{ProviderError, ProviderResult};

/// Hard cap on characters accepted from any backend, independent of the token
/// budget sent with the request.
pub const MAX_OUTPUT_CHARS: usize = 16_384;

/// POST a JSON body and decode the JSON response.
///
/// Transport errors, timeouts and non-2xx statuses all become
/// [`ProviderError::Failure`].
pub(crate) fn post_json(
    provider: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
    timeout: Duration,
) -> ProviderResult<serde_json::Value> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();

    let body_str = serde_json::to_string(body)
        .map_err(|e| ProviderError::failure(provider, format!("JSON serialize error: {e}")))?;

    let mut request = agent.post(url).set("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.set(name, value);
    }

    let resp = request.send_string(&body_str).map_err(|e| match e {
        ureq::Error::Status(code, resp) => {
            let detail = resp.into_string().unwrap_or_default();
            ProviderError::failure(provider, format!("HTTP {code}: {}", preview(&detail, 200)))
        }
        ureq::Error::Transport(t) => ProviderError::failure(provider, t.to_string()),
    })?;

    let resp_str = resp
        .into_string()
        .map_err(|e| ProviderError::failure(provider, format!("failed to read body: {e}")))?;

    serde_json::from_str(&resp_str)
        .map_err(|e| ProviderError::failure(provider, format!("invalid response JSON: {e}")))
}

/// Truncate backend text to [`MAX_OUTPUT_CHARS`] on a character boundary.
pub(crate) fn bound_output(text: &str) -> String {
    match text.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub(crate) fn normalize_base_url(base_url: &str) -> &str {
    base_url.trim().trim_end_matches('/')
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
