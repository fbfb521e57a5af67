//! Proxy-aware scheme and host resolution for upload URLs
//!
//! Uploads live behind reverse proxies more often than not, so the public
//! URL of an upload cannot be derived from the socket alone. Resolution
//! order, weakest first: the connection itself (TLS or not, `Host` header),
//! then `X-Forwarded-Proto` / `X-Forwarded-Host`, then the `Forwarded`
//! header's `proto=` and `host=` tokens.

use axum::http::{header, HeaderMap, Uri};

/// Scheme and host a request is publicly reachable under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardedContext {
    pub scheme: String,
    pub host: String,
}

impl ForwardedContext {
    /// Resolve scheme and host from request headers.
    ///
    /// The default host is the `Host` header; HTTP/2 clients send
    /// `:authority` instead, which hyper keeps on the request URI, so that
    /// is the fallback. With `respect_forwarded` off the proxy headers are
    /// ignored and only the connection facts are used.
    pub fn from_request(
        headers: &HeaderMap,
        uri: &Uri,
        tls: bool,
        respect_forwarded: bool,
    ) -> Self {
        let mut scheme = if tls { "https" } else { "http" }.to_string();
        let mut host = header_str(headers, header::HOST.as_str())
            .or_else(|| uri.authority().map(|authority| authority.as_str()))
            .unwrap_or_default()
            .to_string();

        if !respect_forwarded {
            return Self { scheme, host };
        }

        if let Some(value) = header_str(headers, "X-Forwarded-Host") {
            if !value.is_empty() {
                host = value.to_string();
            }
        }
        if let Some(value) = header_str(headers, "X-Forwarded-Proto") {
            if value == "http" || value == "https" {
                scheme = value.to_string();
            }
        }
        if let Some(value) = header_str(headers, "Forwarded") {
            if let Some(forwarded) = forwarded_host(value) {
                host = forwarded.to_string();
            }
            if let Some(proto) = forwarded_proto(value) {
                scheme = proto.to_string();
            }
        }

        Self { scheme, host }
    }
}

/// Build the absolute URL of an upload by appending the id to the request
/// path of the creation route, so the result reads `scheme://host/media/<id>`
/// whether or not the route carries a trailing slash.
pub fn absolute_url(ctx: &ForwardedContext, path: &str, id: &str) -> String {
    let sep = if path.ends_with('/') { "" } else { "/" };
    format!("{}://{}{}{}{}", ctx.scheme, ctx.host, path, sep, id)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Extract the first non-empty `host=` token value. An optional leading
/// quote is skipped and the value ends at `"` or `;`.
fn forwarded_host(value: &str) -> Option<&str> {
    let mut search = 0;
    while let Some(pos) = value[search..].find("host=") {
        let start = search + pos + "host=".len();
        let rest = value[start..].strip_prefix('"').unwrap_or(&value[start..]);
        let end = rest.find(['"', ';']).unwrap_or(rest.len());
        if end > 0 {
            return Some(&rest[..end]);
        }
        search = start;
    }
    None
}

/// Extract the first `proto=` token naming a plain `http`/`https` scheme.
/// Quoted tokens are not recognized.
fn forwarded_proto(value: &str) -> Option<&'static str> {
    let mut search = 0;
    while let Some(pos) = value[search..].find("proto=") {
        let start = search + pos + "proto=".len();
        let rest = &value[start..];
        if rest.starts_with("https") {
            return Some("https");
        }
        if rest.starts_with("http") {
            return Some("http");
        }
        search = start;
    }
    None
}
