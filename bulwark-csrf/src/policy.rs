//! Which requests need a token, and where the submitted token comes from.

use bulwark_core::HttpRequest;
use http::Method;

/// How the guard treats a request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// GET, HEAD, OPTIONS, TRACE. Never rejected, may receive a token.
    Safe,
    /// Everything else. Must echo the cookie token.
    Mutating,
}

impl MethodClass {
    pub fn of(method: &Method) -> Self {
        if method.is_safe() {
            MethodClass::Safe
        } else {
            MethodClass::Mutating
        }
    }
}

/// Whether `path` is one of the excluded prefixes or lies below one.
///
/// Matching stops at segment boundaries: `/hooks` covers `/hooks/github` but
/// not `/hooksadmin`.
pub fn is_excluded(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        path.strip_prefix(prefix.as_str()).is_some_and(|rest| {
            rest.is_empty() || prefix.ends_with('/') || rest.starts_with('/')
        })
    })
}

/// Token submitted with the request: the header first, then the body field.
pub fn submitted_token(request: &HttpRequest, header: &str, field: &str) -> Option<String> {
    request
        .header(header)
        .map(str::to_string)
        .or_else(|| body_field(request, field))
        .filter(|token| !token.is_empty())
}

fn body_field(request: &HttpRequest, field: &str) -> Option<String> {
    if request.body.is_empty() {
        return None;
    }

    match request.content_type() {
        Some(ct) if ct.eq_ignore_ascii_case("application/x-www-form-urlencoded") => {
            form_field(&request.body, field)
        }
        Some(ct) if is_json(ct) => json_field(&request.body, field),
        Some(_) => None,
        None => json_field(&request.body, field).or_else(|| form_field(&request.body, field)),
    }
}

fn is_json(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct == "application/json" || ct.ends_with("+json")
}

fn json_field(body: &[u8], field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get(field)?.as_str().map(str::to_string)
}

fn form_field(body: &[u8], field: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == field)
        .map(|(_, value)| value)
}
