//! Host-header validation for the injected `Host` request header.
//!
//! A close port of `ngx_http_headers_validate_host`: a single pass over the
//! bytes tracking a tiny state machine (plain label / bracketed IPv6
//! literal / trailing port), preserving its exact boundary quirks (a
//! leading dot is accepted, only *interior* doubled dots are rejected,
//! because the C loop's `dot_pos == i - 1` check can't trigger at `i == 0`).

use crate::error::{ProxyError, ProxyResult};

#[derive(PartialEq, Eq)]
enum State {
    Usual,
    Literal,
    Rest,
}

/// Validates and normalizes a candidate `Host` value.
///
/// Rejects embedded NULs, path separators, and empty labels (`..`).
/// Recognizes the bracketed IPv6-literal form `[::1]`, truncates at
/// `:port`, strips a single trailing dot, and lowercases the result if any
/// uppercase ASCII was present.
pub fn validate_host(host: &str) -> ProxyResult<String> {
    let bytes = host.as_bytes();
    let mut state = State::Usual;
    let mut dot_pos = bytes.len();
    let mut host_len = bytes.len();
    let mut alloc = false;

    for (i, &ch) in bytes.iter().enumerate() {
        match ch {
            b'.' => {
                if i > 0 && dot_pos == i - 1 {
                    return Err(ProxyError::ProtocolInvalid(
                        "invalid host: empty label".to_string(),
                    ));
                }
                dot_pos = i;
            }
            b':' => {
                if state == State::Usual {
                    host_len = i;
                    state = State::Rest;
                }
            }
            b'[' => {
                if i == 0 {
                    state = State::Literal;
                }
            }
            b']' => {
                if state == State::Literal {
                    host_len = i + 1;
                    state = State::Rest;
                }
            }
            0 => {
                return Err(ProxyError::ProtocolInvalid(
                    "invalid host: embedded NUL".to_string(),
                ))
            }
            b'/' | b'\\' => {
                return Err(ProxyError::ProtocolInvalid(
                    "invalid host: path separator".to_string(),
                ))
            }
            c if c.is_ascii_uppercase() => alloc = true,
            _ => {}
        }
    }

    if host_len > 0 && dot_pos == host_len - 1 {
        host_len -= 1;
    }

    if host_len == 0 {
        return Err(ProxyError::ProtocolInvalid(
            "invalid host: empty after truncation".to_string(),
        ));
    }

    let truncated = &host[..host_len];
    Ok(if alloc {
        truncated.to_ascii_lowercase()
    } else {
        truncated.to_string()
    })
}
