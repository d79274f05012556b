//! The header-mutation filter (HF) and expires engine (EX).
//!
//! Orchestrates the pieces in the sibling modules the way
//! `ngx_http_headers_filter` walks its configured rule array: classify the
//! response status, run expires, run each rule in configured order, then
//! (for trailers) flag `expect_trailers` so the body filter can emit them at
//! the last buffer.

pub mod chain;
pub mod expires;
pub mod host;
pub mod model;
pub mod rule;
pub mod template;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{AddHeaderDirective, AddInputHeaderDirective, ExpiresDirective, HeaderFilterConfig};
use crate::error::{ProxyError, ProxyResult};
use expires::{compute_expires, parse_expires_spec, ExpiresConfig};
use host::validate_host;
use model::{
    MultiResponseHeader, RequestHeaders, ResponseHeaders, TypedRequestHeader, TypedResponseHeader,
};
use rule::{
    classify_connection, classify_user_agent, parse_content_type, HeaderRule, RequestHandlerKind,
    RequestHeaderRule, ResponseHandlerKind,
};
use template::{ComplexValue, TemplateContext, VarTemplate};

/// Status codes for which non-`always` rules apply.
pub const SAFE_STATUSES: [u16; 10] = [200, 201, 204, 206, 301, 302, 303, 304, 307, 308];

pub fn is_safe_status(status: u16) -> bool {
    SAFE_STATUSES.contains(&status)
}

/// A compiled header filter for one location: the expires directive plus
/// response/trailer/input-header rules, resolved against the recognized
/// tables once at config load.
pub struct HeaderFilter {
    expires: Option<ExpiresConfig>,
    rules: Vec<HeaderRule>,
    trailer_rules: Vec<HeaderRule>,
    input_rules: Vec<RequestHeaderRule>,
    add_header_subrequest: bool,
}

impl HeaderFilter {
    pub fn compile(config: &HeaderFilterConfig) -> ProxyResult<Self> {
        let expires = config
            .expires
            .as_ref()
            .map(|d| Self::compile_expires(d))
            .transpose()?;

        let rules = config
            .headers
            .iter()
            .map(Self::compile_rule)
            .collect::<Vec<_>>();
        let trailer_rules = config
            .trailers
            .iter()
            .map(Self::compile_rule)
            .collect::<Vec<_>>();
        let input_rules = config
            .input_headers
            .iter()
            .map(Self::compile_input_rule)
            .collect::<Vec<_>>();

        Ok(HeaderFilter {
            expires,
            rules,
            trailer_rules,
            input_rules,
            add_header_subrequest: config.add_header_subrequest,
        })
    }

    /// Compiles an `expires` directive. A value containing a `$var`
    /// reference is a complex value, re-evaluated and re-parsed per
    /// response; anything else is parsed once, here.
    fn compile_expires(d: &ExpiresDirective) -> ProxyResult<ExpiresConfig> {
        if d.spec.contains('$') {
            let template: Box<dyn ComplexValue> = Box::new(VarTemplate::compile(&d.spec));
            Ok(ExpiresConfig::dynamic(template, d.modified))
        } else {
            parse_expires_spec(&d.spec, d.modified)
        }
    }

    fn compile_rule(d: &AddHeaderDirective) -> HeaderRule {
        let template: Box<dyn ComplexValue> = Box::new(VarTemplate::compile(&d.value));
        HeaderRule::new(d.name.clone(), d.always, template)
    }

    fn compile_input_rule(d: &AddInputHeaderDirective) -> RequestHeaderRule {
        let template: Box<dyn ComplexValue> = Box::new(VarTemplate::compile(&d.value));
        RequestHeaderRule::new(d.name.clone(), template)
    }

    /// Runs the header-filter algorithm (spec.md §4.1, steps 1-4) against a
    /// response. Returns whether trailer emission should be expected at the
    /// last buffer (step 4).
    pub fn run_headers(
        &self,
        response: &mut ResponseHeaders,
        ctx: &dyn TemplateContext,
        is_subrequest: bool,
    ) -> ProxyResult<bool> {
        if is_subrequest && !self.add_header_subrequest {
            return Ok(false);
        }
        if self.expires.is_none() && self.rules.is_empty() && self.trailer_rules.is_empty() {
            return Ok(false);
        }

        let safe = is_safe_status(response.status);

        if let Some(expires) = &self.expires {
            if safe {
                self.apply_expires(expires, ctx, response);
            }
        }

        for rule in &self.rules {
            if !safe && !rule.always {
                continue;
            }
            let value = rule.value_template.evaluate(ctx)?;
            self.dispatch_response(rule, &value, response)?;
        }

        let expect_trailers = safe_or_always_any(&self.trailer_rules, safe);
        Ok(expect_trailers)
    }

    /// Runs the body filter's trailer half, at the chunk carrying the
    /// response's last buffer.
    pub fn run_trailers(
        &self,
        trailers: &mut ResponseHeaders,
        ctx: &dyn TemplateContext,
        safe: bool,
    ) -> ProxyResult<()> {
        for rule in &self.trailer_rules {
            if !safe && !rule.always {
                continue;
            }
            let value = rule.value_template.evaluate(ctx)?;
            if !value.is_empty() {
                trailers.list.push(rule.key.clone(), value);
            }
        }
        Ok(())
    }

    /// Runs the rewrite-phase input-header injection (spec.md §6's
    /// "per-request rewrite phase handler list").
    pub fn run_input_headers(
        &self,
        request: &mut RequestHeaders,
        ctx: &dyn TemplateContext,
    ) -> ProxyResult<()> {
        for rule in &self.input_rules {
            let value = rule.value_template.evaluate(ctx)?;
            self.dispatch_request(rule, &value, request)?;
        }
        Ok(())
    }

    fn apply_expires(
        &self,
        expires: &ExpiresConfig,
        ctx: &dyn TemplateContext,
        response: &mut ResponseHeaders,
    ) {
        let Some(resolved) = expires.resolve(ctx) else {
            return;
        };

        let now = SystemTime::now();
        let last_modified = (response.last_modified_time >= 0)
            .then(|| UNIX_EPOCH + Duration::from_secs(response.last_modified_time as u64));

        if let Some(headers) = compute_expires(&resolved, now, last_modified) {
            response.set_typed(TypedResponseHeader::Expires, "Expires", &headers.expires);
            self.set_cache_control_singleton(response, &headers.cache_control);
        }
    }

    /// Keeps `Cache-Control` a singleton: the first live entry is rewritten
    /// in place, any later ones are tombstoned, matching the source's
    /// uniqueness guarantee for engine-produced cache directives.
    fn set_cache_control_singleton(&self, response: &mut ResponseHeaders, value: &str) {
        let slots = response.multi_slot(MultiResponseHeader::CacheControl).to_vec();
        if let Some(&first) = slots.first() {
            response.list.set_value(first, value);
            for &idx in &slots[1..] {
                response.list.tombstone(idx);
            }
        } else {
            response.add_multi(MultiResponseHeader::CacheControl, "Cache-Control", value);
        }
    }

    fn dispatch_response(
        &self,
        rule: &HeaderRule,
        value: &str,
        response: &mut ResponseHeaders,
    ) -> ProxyResult<()> {
        match rule.kind {
            ResponseHandlerKind::SetTyped(header) => {
                if value.is_empty() {
                    response.clear_typed(header);
                } else {
                    response.set_typed(header, &rule.key, value);
                }
            }
            ResponseHandlerKind::AddMulti(header) => {
                if !value.is_empty() {
                    response.add_multi(header, &rule.key, value);
                }
            }
            ResponseHandlerKind::AddGeneric => {
                if rule.is_wildcard() {
                    let touched = response.list.delete_matching_wildcard(rule.wildcard_prefix());
                    response.drop_tombstoned(&touched);
                } else if !value.is_empty() {
                    response.list.push(rule.key.clone(), value.to_string());
                }
            }
            ResponseHandlerKind::SetLastModified => {
                if value.is_empty() {
                    response.clear_last_modified();
                } else {
                    let time = httpdate::parse_http_date(value)
                        .map(|t| {
                            t.duration_since(UNIX_EPOCH)
                                .map(|d| d.as_secs() as i64)
                                .unwrap_or(-1)
                        })
                        .unwrap_or(-1);
                    response.set_last_modified(&rule.key, value, time);
                }
            }
            ResponseHandlerKind::SetAcceptRanges => {
                if value.is_empty() {
                    response.clear_accept_ranges();
                } else {
                    response.set_accept_ranges(&rule.key, value);
                }
            }
            ResponseHandlerKind::SetContentLength => {
                if value.is_empty() {
                    response.clear_content_length();
                } else {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| ProxyError::ProtocolInvalid("invalid Content-Length".to_string()))?;
                    response.set_content_length(&rule.key, value, n);
                }
            }
            ResponseHandlerKind::SetContentType => {
                if value.is_empty() {
                    response.clear_content_type();
                } else {
                    let (type_len, charset) = parse_content_type(value);
                    response.set_content_type(value, type_len, charset);
                }
            }
        }
        Ok(())
    }

    fn dispatch_request(
        &self,
        rule: &RequestHeaderRule,
        value: &str,
        request: &mut RequestHeaders,
    ) -> ProxyResult<()> {
        match rule.kind {
            RequestHandlerKind::SetTyped(header) => {
                if value.is_empty() {
                    request.clear_typed(header);
                } else {
                    request.set_typed(header, &rule.key, value);
                }
            }
            RequestHandlerKind::AddMulti(header) => {
                if !value.is_empty() {
                    request.add_multi(header, &rule.key, value);
                }
            }
            RequestHandlerKind::AddGeneric => {
                if !value.is_empty() {
                    request.list.push(rule.key.clone(), value.to_string());
                }
            }
            RequestHandlerKind::SetHostReq => {
                if value.is_empty() {
                    request.clear_typed(TypedRequestHeader::Host);
                    request.validated_host = None;
                } else {
                    let validated = validate_host(value)?;
                    request.set_typed(TypedRequestHeader::Host, &rule.key, value);
                    request.validated_host = Some(validated);
                }
            }
            RequestHandlerKind::SetConnReq => {
                request.connection_type = classify_connection(value);
                if value.is_empty() {
                    request.clear_typed(TypedRequestHeader::Connection);
                } else {
                    request.set_typed(TypedRequestHeader::Connection, &rule.key, value);
                }
            }
            RequestHandlerKind::SetUaReq => {
                request.browser = classify_user_agent(value);
                if value.is_empty() {
                    request.clear_typed(TypedRequestHeader::UserAgent);
                } else {
                    request.set_typed(TypedRequestHeader::UserAgent, &rule.key, value);
                }
            }
            RequestHandlerKind::SetClenReq => {
                if value.is_empty() {
                    request.clear_typed(TypedRequestHeader::ContentLength);
                    request.content_length_n = -1;
                } else {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| ProxyError::ProtocolInvalid("invalid Content-Length".to_string()))?;
                    request.set_typed(TypedRequestHeader::ContentLength, &rule.key, value);
                    request.content_length_n = n;
                }
            }
        }
        Ok(())
    }
}

fn safe_or_always_any(rules: &[HeaderRule], safe: bool) -> bool {
    rules.iter().any(|r| safe || r.always)
}
