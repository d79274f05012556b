//! Complex-value (templated string) evaluation.
//!
//! Ports the "complex-value evaluator" external collaborator into a trait
//! this crate consumes, plus a minimal implementation sufficient to drive
//! the header filter end-to-end in tests. The variable-lookup surface is
//! grounded on pingsix's `request_selector_key`/`expand_vars`
//! (`plugins/response_rewrite.rs`) and `handle_vars` (`proxy/upstream.rs`):
//! both swap `$name`-style placeholders for per-request values without
//! pulling in a general templating engine.

use crate::error::ProxyResult;

/// Value lookup surface a template evaluates against, standing in for
/// `ngx_http_request_t`'s variable table.
pub trait TemplateContext {
    /// Returns the value of `$name`, or `None` if the variable is unknown
    /// (unlike nginx, unknown variables are not a hard error at this layer;
    /// callers choose whether an empty expansion is acceptable).
    fn lookup(&self, name: &str) -> Option<String>;
}

/// A precompiled template, evaluable against a request-shaped
/// [`TemplateContext`]. Mirrors `ngx_http_complex_value_t`: the compile step
/// (parsing literal runs and `$var` references) happens once, evaluation
/// happens per request.
pub trait ComplexValue: Send + Sync {
    fn evaluate(&self, ctx: &dyn TemplateContext) -> ProxyResult<String>;
}

/// A template with no variable references; evaluation is just a clone.
#[derive(Clone, Debug)]
pub struct StaticTemplate(pub String);

impl ComplexValue for StaticTemplate {
    fn evaluate(&self, _ctx: &dyn TemplateContext) -> ProxyResult<String> {
        Ok(self.0.clone())
    }
}

/// A minimal compiled template: alternating literal and `$var` segments, the
/// same split `expand_vars` does at evaluation time except precomputed once
/// at config load instead of re-scanning the string on every request.
#[derive(Clone, Debug)]
pub struct VarTemplate {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Var(String),
}

impl VarTemplate {
    /// Compiles `raw`, splitting on `$identifier` references (ASCII
    /// alphanumeric/underscore run following `$`).
    pub fn compile(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek().is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                segments.push(Segment::Var(name));
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        VarTemplate { segments }
    }
}

impl ComplexValue for VarTemplate {
    fn evaluate(&self, ctx: &dyn TemplateContext) -> ProxyResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Var(name) => {
                    if let Some(value) = ctx.lookup(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapContext(HashMap<String, String>);

    impl TemplateContext for MapContext {
        fn lookup(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn static_template_returns_literal_value() {
        let t = StaticTemplate("no-cache".to_string());
        let ctx = MapContext(HashMap::new());
        assert_eq!(t.evaluate(&ctx).unwrap(), "no-cache");
    }

    #[test]
    fn var_template_substitutes_known_variables() {
        let t = VarTemplate::compile("client=$remote_addr;rid=$request_id");
        let mut vars = HashMap::new();
        vars.insert("remote_addr".to_string(), "10.0.0.1".to_string());
        vars.insert("request_id".to_string(), "abc123".to_string());
        let ctx = MapContext(vars);

        assert_eq!(t.evaluate(&ctx).unwrap(), "client=10.0.0.1;rid=abc123");
    }

    #[test]
    fn var_template_leaves_unknown_variables_empty() {
        let t = VarTemplate::compile("v=$unknown");
        let ctx = MapContext(HashMap::new());
        assert_eq!(t.evaluate(&ctx).unwrap(), "v=");
    }
}
