//! Request guards that run before the body is read: origin, content type, client key.

use axum::http::{HeaderMap, header};
use std::net::SocketAddr;

use formgate_common::constants::{UNKNOWN_CLIENT, headers as header_names};

/// Strip a trailing slash so `https://a.example/` matches `https://a.example`
pub fn normalize_origin(origin: &str) -> &str {
    let origin = origin.trim();
    origin.strip_suffix('/').unwrap_or(origin)
}

/// Declared origin of the request: `Origin`, else the origin part of `Referer`
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = header_str(headers, header::ORIGIN.as_str()) {
        return Some(origin.to_string());
    }

    let referer = header_str(headers, header::REFERER.as_str())?;
    let url = url::Url::parse(referer).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// True when the declared origin equals the allowed one. Fails closed.
pub fn origin_allowed(headers: &HeaderMap, allowed_origin: &str) -> bool {
    match request_origin(headers) {
        Some(origin) => {
            normalize_origin(&origin).eq_ignore_ascii_case(normalize_origin(allowed_origin))
        }
        None => false,
    }
}

/// True when the body is declared as `application/json` (parameters allowed)
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    header_str(headers, header::CONTENT_TYPE.as_str())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Best-effort client identity for rate limiting
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_str(headers, header_names::X_FORWARDED_FOR)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, header_names::X_REAL_IP)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
