//! Chained filter registration surface.
//!
//! The source keeps a single process-wide `ngx_http_top_header_filter`
//! pointer that each module wraps at init time. Pingsix's plugin chain
//! (`core/traits.rs`'s `PluginExecutor`, forwarding through a
//! `Vec<Arc<dyn ProxyPlugin>>`) is the same pattern without raw function
//! pointers: a filter is a link that runs its own logic and then forwards to
//! the next link. Modeling it as a trait lets the header filter sit anywhere
//! in a chain a host proxy assembles.

use crate::error::ProxyResult;
use crate::headers::model::{RequestHeaders, ResponseHeaders};

/// A single link in the output header/trailer filter chain.
pub trait HeaderFilterChain {
    /// Runs this link's header mutation, then forwards to the next link.
    /// Implementors that are the last link just return `Ok(())`.
    fn on_headers(&self, response: &mut ResponseHeaders, request: &RequestHeaders)
        -> ProxyResult<()>;

    /// Runs this link's trailer mutation. Called once, at the chunk
    /// containing the body's last buffer.
    fn on_trailers(
        &self,
        trailers: &mut ResponseHeaders,
        request: &RequestHeaders,
    ) -> ProxyResult<()>;
}

/// Forwards to an inner chain after running first, the shape every real
/// filter stage takes (`HF` itself implements this by wrapping `None` or an
/// inner `dyn HeaderFilterChain`).
pub struct ChainLink<F> {
    pub filter: F,
    pub next: Option<Box<dyn HeaderFilterChain>>,
}

impl<F> HeaderFilterChain for ChainLink<F>
where
    F: Fn(&mut ResponseHeaders, &RequestHeaders) -> ProxyResult<()>,
{
    fn on_headers(
        &self,
        response: &mut ResponseHeaders,
        request: &RequestHeaders,
    ) -> ProxyResult<()> {
        (self.filter)(response, request)?;
        if let Some(next) = &self.next {
            next.on_headers(response, request)?;
        }
        Ok(())
    }

    fn on_trailers(
        &self,
        trailers: &mut ResponseHeaders,
        request: &RequestHeaders,
    ) -> ProxyResult<()> {
        (self.filter)(trailers, request)?;
        if let Some(next) = &self.next {
            next.on_trailers(trailers, request)?;
        }
        Ok(())
    }
}
