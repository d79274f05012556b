//! Configured header rules and the closed-set handler dispatch they resolve
//! to.
//!
//! The source keeps two `ngx_http_set_header_t[]` tables mapping a
//! recognized header name to a struct offset and a function pointer. Since
//! the set of handlers is closed, that becomes a name lookup into a
//! `HandlerKind` enum built once at config load, per the "Dynamic dispatch
//! via function-pointer tables" design note — no runtime indirection beyond
//! a `match`.

use crate::headers::model::{MultiRequestHeader, MultiResponseHeader, TypedRequestHeader, TypedResponseHeader};
use crate::headers::template::ComplexValue;

/// Which response-side handler a recognized (or generic) header name
/// resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseHandlerKind {
    SetTyped(TypedResponseHeader),
    AddMulti(MultiResponseHeader),
    AddGeneric,
    SetLastModified,
    SetAcceptRanges,
    SetContentLength,
    SetContentType,
}

/// Which request-side handler a recognized (or generic) header name
/// resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestHandlerKind {
    SetTyped(TypedRequestHeader),
    AddMulti(MultiRequestHeader),
    AddGeneric,
    SetHostReq,
    SetConnReq,
    SetUaReq,
    SetClenReq,
}

/// Looks up `name` (case-insensitive) in the recognized response-header
/// table; unmatched names fall back to `AddGeneric`.
pub fn classify_response_header(name: &str) -> ResponseHandlerKind {
    use ResponseHandlerKind::*;
    use TypedResponseHeader::*;

    match_ignore_case(name, &[
        ("Link", AddMulti(MultiResponseHeader::Link)),
        ("Server", SetTyped(Server)),
        ("Date", SetTyped(Date)),
        ("Content-Encoding", SetTyped(ContentEncoding)),
        ("Location", SetTyped(Location)),
        ("Refresh", SetTyped(Refresh)),
        ("Last-Modified", SetLastModified),
        ("Content-Range", SetTyped(ContentRange)),
        ("Accept-Ranges", SetAcceptRanges),
        ("WWW-Authenticate", SetTyped(WwwAuthenticate)),
        ("Expires", SetTyped(Expires)),
        ("E-Tag", SetTyped(ETag)),
        ("ETag", SetTyped(ETag)),
        ("Content-Length", SetContentLength),
        ("Content-Type", SetContentType),
        ("Cache-Control", AddMulti(MultiResponseHeader::CacheControl)),
    ])
    .unwrap_or(AddGeneric)
}

/// Looks up `name` (case-insensitive) in the recognized request-header
/// table; unmatched names fall back to `AddGeneric`.
pub fn classify_request_header(name: &str) -> RequestHandlerKind {
    use RequestHandlerKind::*;
    use TypedRequestHeader::*;

    match_ignore_case(name, &[
        ("Host", SetHostReq),
        ("Connection", SetConnReq),
        ("If-Modified-Since", SetTyped(IfModifiedSince)),
        ("If-Unmodified-Since", SetTyped(IfUnmodifiedSince)),
        ("If-Match", SetTyped(IfMatch)),
        ("If-None-Match", SetTyped(IfNoneMatch)),
        ("User-Agent", SetUaReq),
        ("Referer", SetTyped(Referer)),
        ("Content-Length", SetClenReq),
        ("Content-Range", SetTyped(ContentRange)),
        ("Content-Type", SetTyped(ContentType)),
        ("Range", SetTyped(Range)),
        ("If-Range", SetTyped(IfRange)),
        ("Transfer-Encoding", SetTyped(TransferEncoding)),
        ("TE", SetTyped(Te)),
        ("Expect", SetTyped(Expect)),
        ("Upgrade", SetTyped(Upgrade)),
        ("Accept-Encoding", SetTyped(AcceptEncoding)),
        ("Via", SetTyped(Via)),
        ("Authorization", SetTyped(Authorization)),
        ("Keep-Alive", SetTyped(KeepAlive)),
        ("X-Forwarded-For", AddMulti(MultiRequestHeader::XForwardedFor)),
        ("X-Real-IP", SetTyped(XRealIp)),
        ("Accept", SetTyped(Accept)),
        ("Accept-Language", SetTyped(AcceptLanguage)),
        ("Depth", SetTyped(Depth)),
        ("Destination", SetTyped(Destination)),
        ("Overwrite", SetTyped(Overwrite)),
        ("Date", SetTyped(Date)),
        ("Cookie", AddMulti(MultiRequestHeader::Cookie)),
    ])
    .unwrap_or(AddGeneric)
}

fn match_ignore_case<T: Copy>(name: &str, table: &[(&str, T)]) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, kind)| *kind)
}

/// A single configured `add_header`/`add_trailer` rule, resolved against the
/// recognized-header table at construction time.
pub struct HeaderRule {
    pub key: String,
    pub always: bool,
    pub kind: ResponseHandlerKind,
    pub value_template: Box<dyn ComplexValue>,
}

impl HeaderRule {
    pub fn new(key: impl Into<String>, always: bool, value_template: Box<dyn ComplexValue>) -> Self {
        let key = key.into();
        let kind = if let Some(prefix) = key.strip_suffix('*') {
            // Wildcard rules never hit a recognized typed/multi slot; they
            // always resolve to the generic deletion path.
            let _ = prefix;
            ResponseHandlerKind::AddGeneric
        } else {
            classify_response_header(&key)
        };
        HeaderRule { key, always, kind, value_template }
    }

    pub fn is_wildcard(&self) -> bool {
        self.key.ends_with('*')
    }

    pub fn wildcard_prefix(&self) -> &str {
        self.key.trim_end_matches('*')
    }
}

/// A single configured `add_input_header` rule.
pub struct RequestHeaderRule {
    pub key: String,
    pub kind: RequestHandlerKind,
    pub value_template: Box<dyn ComplexValue>,
}

impl RequestHeaderRule {
    pub fn new(key: impl Into<String>, value_template: Box<dyn ComplexValue>) -> Self {
        let key = key.into();
        let kind = classify_request_header(&key);
        RequestHeaderRule { key, kind, value_template }
    }
}

/// Content-Type header parsing: splits off a trailing `; charset=...`
/// parameter, matching `ngx_http_set_content_type_header`. Returns the
/// byte length of the type portion (for `content_type_len`) and the
/// unquoted charset, if any.
pub fn parse_content_type(value: &str) -> (usize, Option<String>) {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b';' {
            i += 1;
            continue;
        }

        let semi = i;
        let mut p = i + 1;
        while p < bytes.len() && bytes[p] == b' ' {
            p += 1;
        }
        if p >= bytes.len() {
            break;
        }

        let rest = &value[p..];
        if rest.len() < 8 || !rest[..8].eq_ignore_ascii_case("charset=") {
            i += 1;
            continue;
        }

        let mut charset_start = p + 8;
        if bytes.get(charset_start) == Some(&b'"') {
            charset_start += 1;
        }
        let mut charset_end = bytes.len();
        if charset_end > charset_start && bytes[charset_end - 1] == b'"' {
            charset_end -= 1;
        }

        let charset = value[charset_start..charset_end].to_string();
        return (semi, Some(charset));
    }

    (value.len(), None)
}

/// User-Agent browser classification, matching
/// `ngx_http_set_user_agent_header`'s substring checks.
pub fn classify_user_agent(ua: &str) -> crate::headers::model::BrowserFlags {
    use crate::headers::model::BrowserFlags;

    let mut flags = BrowserFlags::default();
    if ua.is_empty() {
        return flags;
    }

    if let Some(pos) = ua.find("MSIE ") {
        let msie = &ua.as_bytes()[pos..];
        if msie.len() > 7 {
            flags.msie = true;
            if msie[6] == b'.' {
                match msie[5] {
                    b'4' | b'5' => flags.msie6 = true,
                    b'6' => {
                        let rest = &ua[pos + 8..];
                        if !rest.contains("SV1") {
                            flags.msie6 = true;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if ua.contains("Opera") {
        flags.opera = true;
        flags.msie = false;
        flags.msie6 = false;
    }

    if !flags.msie && !flags.opera {
        if ua.contains("Gecko/") {
            flags.gecko = true;
        } else if ua.contains("Chrome/") {
            flags.chrome = true;
        } else if ua.contains("Safari/") && ua.contains("Mac OS X") {
            flags.safari = true;
        } else if ua.contains("Konqueror") {
            flags.konqueror = true;
        }
    }

    flags
}

/// Connection-header classification, matching
/// `ngx_http_set_connection_header`'s `close`/`keep-alive` substring checks.
pub fn classify_connection(value: &str) -> crate::headers::model::ConnectionType {
    use crate::headers::model::ConnectionType;

    if value.is_empty() {
        return ConnectionType::Unset;
    }
    let lower = value.to_ascii_lowercase();
    if lower.contains("close") {
        ConnectionType::Close
    } else if lower.contains("keep-alive") {
        ConnectionType::KeepAlive
    } else {
        ConnectionType::Unset
    }
}
