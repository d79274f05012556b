//! The `expires` directive's state machine: parse a directive spec at
//! config time, compute `Expires`/`Cache-Control` at response time.
//!
//! Grounded directly on `ngx_http_parse_expires`/`ngx_http_set_expires` in
//! the headers filter module. HTTP-date formatting goes through the
//! `httpdate` crate rather than hand-rolled RFC 1123 arithmetic, since
//! nothing in the corpus hand-rolls that format.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{ErrorContext, ProxyError, ProxyResult};
use crate::headers::template::{ComplexValue, TemplateContext};

/// Which branch of the state machine a directive selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiresMode {
    Off,
    Epoch,
    Max,
    Access,
    Modified,
    Daily,
    /// Sentinel used while merging configuration levels; never reaches the
    /// runtime engine (finalizes to `Off`).
    Unset,
}

/// The fully parsed `expires [modified] <spec>` directive.
///
/// `dynamic_template` is set when the directive value is a complex value
/// (contains a `$var` reference) instead of a literal spec: `mode`/`seconds`
/// then hold only the statically-known `modified` flag (encoded as
/// `Modified` vs. `Access`, `seconds` unused) and the real mode/seconds are
/// re-derived every request by evaluating the template and re-parsing the
/// result, mirroring `ngx_http_set_expires`'s `cv.lengths != NULL` branch.
pub struct ExpiresConfig {
    pub mode: ExpiresMode,
    /// Seconds offset (`Access`/`Modified`), or time-of-day-in-seconds
    /// (`Daily`). Negative when the directive used a `-` prefix.
    pub seconds: i64,
    pub dynamic_template: Option<Box<dyn ComplexValue>>,
}

impl std::fmt::Debug for ExpiresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiresConfig")
            .field("mode", &self.mode)
            .field("seconds", &self.seconds)
            .field("dynamic_template", &self.dynamic_template.is_some())
            .finish()
    }
}

impl ExpiresConfig {
    pub fn unset() -> Self {
        ExpiresConfig {
            mode: ExpiresMode::Unset,
            seconds: 0,
            dynamic_template: None,
        }
    }

    /// Resolves the `Unset` sentinel to `Off`, matching config merge
    /// finalization.
    pub fn finalize(self) -> Self {
        if self.mode == ExpiresMode::Unset {
            ExpiresConfig {
                mode: ExpiresMode::Off,
                seconds: 0,
                dynamic_template: None,
            }
        } else {
            self
        }
    }

    /// Builds a statically resolved config directly, for tests and for
    /// [`ExpiresConfig::resolve`]'s no-template shortcut.
    #[cfg(test)]
    pub fn new(mode: ExpiresMode, seconds: i64) -> Self {
        ExpiresConfig { mode, seconds, dynamic_template: None }
    }

    /// Builds a directive whose value is a template, re-evaluated and
    /// re-parsed on every response.
    pub fn dynamic(template: Box<dyn ComplexValue>, modified: bool) -> Self {
        ExpiresConfig {
            mode: if modified { ExpiresMode::Modified } else { ExpiresMode::Access },
            seconds: 0,
            dynamic_template: Some(template),
        }
    }

    /// Evaluates `dynamic_template` against `ctx` and re-parses the result
    /// into a fresh, statically resolved config. Returns `None` (and logs at
    /// debug level) on evaluation or parse failure, per the silent-skip
    /// behavior `ngx_http_set_expires` falls back to when the complex value
    /// doesn't parse as a valid expires spec. A config with no dynamic
    /// template resolves to itself.
    pub fn resolve(&self, ctx: &dyn TemplateContext) -> Option<ExpiresConfig> {
        let Some(template) = &self.dynamic_template else {
            return Some(ExpiresConfig {
                mode: self.mode,
                seconds: self.seconds,
                dynamic_template: None,
            });
        };

        let modified = self.mode == ExpiresMode::Modified;
        let resolved = template
            .evaluate(ctx)
            .with_context("evaluating dynamic expires template")
            .and_then(|value| {
                parse_expires_spec(&value, modified).with_context("parsing dynamic expires value")
            });

        match resolved {
            Ok(config) => Some(config),
            Err(err) => {
                log::debug!("skipping expires directive: {err}");
                None
            }
        }
    }
}

/// Parses `spec` (the directive value with `modified` already stripped and
/// passed separately) into an [`ExpiresConfig`].
pub fn parse_expires_spec(spec: &str, modified: bool) -> ProxyResult<ExpiresConfig> {
    match spec {
        "epoch" => return Ok(ExpiresConfig { mode: ExpiresMode::Epoch, seconds: 0, dynamic_template: None }),
        "max" => return Ok(ExpiresConfig { mode: ExpiresMode::Max, seconds: 0, dynamic_template: None }),
        "off" => return Ok(ExpiresConfig { mode: ExpiresMode::Off, seconds: 0, dynamic_template: None }),
        _ => {}
    }

    if let Some(rest) = spec.strip_prefix('@') {
        if modified {
            return Err(ProxyError::Configuration(
                "daily time cannot be used with \"modified\" parameter".to_string(),
            ));
        }
        let seconds = parse_duration(rest)?;
        if seconds > 24 * 60 * 60 {
            return Err(ProxyError::Configuration(
                "daily time value must be less than 24 hours".to_string(),
            ));
        }
        return Ok(ExpiresConfig { mode: ExpiresMode::Daily, seconds, dynamic_template: None });
    }

    let (rest, minus) = if let Some(rest) = spec.strip_prefix('+') {
        (rest, false)
    } else if let Some(rest) = spec.strip_prefix('-') {
        (rest, true)
    } else {
        (spec, false)
    };

    let mut seconds = parse_duration(rest)?;
    if minus {
        seconds = -seconds;
    }

    let mode = if modified {
        ExpiresMode::Modified
    } else {
        ExpiresMode::Access
    };

    Ok(ExpiresConfig { mode, seconds, dynamic_template: None })
}

/// A small duration grammar: a plain integer is seconds; a single-letter
/// suffix (`s`/`m`/`h`/`d`/`w`) scales it, mirroring `ngx_parse_time`'s unit
/// table (years/months omitted — not used by any example directive in the
/// corpus).
fn parse_duration(raw: &str) -> ProxyResult<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProxyError::Configuration("invalid value".to_string()));
    }

    let (digits, unit) = match raw.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&raw[..raw.len() - 1], Some(c)),
        _ => (raw, None),
    };

    let value: i64 = digits
        .parse()
        .map_err(|_| ProxyError::Configuration("invalid value".to_string()))?;

    let scale = match unit {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 24 * 60 * 60,
        Some('w') => 7 * 24 * 60 * 60,
        Some(_) => {
            return Err(ProxyError::Configuration("invalid value".to_string()));
        }
    };

    Ok(value * scale)
}

/// The two headers HF must emit for a given configuration and request time.
pub struct ExpiresHeaders {
    pub expires: String,
    pub cache_control: String,
}

const EPOCH_DATE: &str = "Thu, 01 Jan 1970 00:00:01 GMT";
const MAX_DATE: &str = "Thu, 31 Dec 2037 23:55:55 GMT";
const MAX_AGE_TEN_YEARS: i64 = 315_360_000;

/// Runs the runtime half of the state machine described in the source's
/// `ngx_http_set_expires`. `last_modified` is `None` when the response
/// carries no `Last-Modified` (the `Modified` branch then behaves like
/// `Access`, per the source's fallback).
pub fn compute_expires(
    config: &ExpiresConfig,
    now: SystemTime,
    last_modified: Option<SystemTime>,
) -> Option<ExpiresHeaders> {
    match config.mode {
        ExpiresMode::Off | ExpiresMode::Unset => None,
        ExpiresMode::Epoch => Some(ExpiresHeaders {
            expires: EPOCH_DATE.to_string(),
            cache_control: "no-cache".to_string(),
        }),
        ExpiresMode::Max => Some(ExpiresHeaders {
            expires: MAX_DATE.to_string(),
            cache_control: format!("max-age={MAX_AGE_TEN_YEARS}"),
        }),
        // `seconds == 0` is the "expires now" shortcut, but only outside
        // `Daily` (midnight is itself a meaningful time-of-day there).
        ExpiresMode::Daily => Some(compute_daily(config.seconds, now)),
        _ if config.seconds == 0 => Some(ExpiresHeaders {
            expires: httpdate::fmt_http_date(now),
            cache_control: "max-age=0".to_string(),
        }),
        ExpiresMode::Access => Some(compute_offset(config.seconds, now)),
        ExpiresMode::Modified => match last_modified {
            Some(lm) => Some(compute_from_modified(config.seconds, now, lm)),
            None => Some(compute_offset(config.seconds, now)),
        },
    }
}

fn compute_daily(time_of_day_secs: i64, now: SystemTime) -> ExpiresHeaders {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let midnight = now_secs - (now_secs.rem_euclid(86_400));
    let mut expires_time = midnight + time_of_day_secs;
    if expires_time < now_secs {
        expires_time += 86_400;
    }
    let max_age = expires_time - now_secs;
    render(expires_time, max_age, time_of_day_secs)
}

fn compute_offset(seconds: i64, now: SystemTime) -> ExpiresHeaders {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let expires_time = now_secs + seconds;
    render(expires_time, seconds, seconds)
}

fn compute_from_modified(seconds: i64, now: SystemTime, last_modified: SystemTime) -> ExpiresHeaders {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let lm_secs = last_modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let expires_time = lm_secs + seconds;
    let max_age = expires_time - now_secs;
    render(expires_time, max_age, seconds)
}

/// `configured_seconds` is the directive's own offset (`conf->expires_time`
/// in the source), distinct from `max_age` whenever the expiry is computed
/// relative to something other than "now" (the `Modified` branch measures
/// from `Last-Modified`, not from the request time). The source ORs both
/// negativity checks before deciding `no-cache`, since a negative directive
/// can still produce a nonnegative `max_age` when `Last-Modified` is in the
/// future relative to now.
fn render(expires_time: i64, max_age: i64, configured_seconds: i64) -> ExpiresHeaders {
    let expires_system_time = UNIX_EPOCH + Duration::from_secs(expires_time.max(0) as u64);
    let cache_control = if max_age < 0 || configured_seconds < 0 {
        "no-cache".to_string()
    } else {
        format!("max-age={max_age}")
    };
    ExpiresHeaders {
        expires: httpdate::fmt_http_date(expires_system_time),
        cache_control,
    }
}
