//! Core header-mutation filter and upstream keepalive pool for a
//! reverse-proxy data path.
//!
//! This crate deliberately stops at the edge of the things a host runtime
//! supplies: HTTP parsing, TLS, balancer selection, and the event loop are
//! all consumed through traits (`headers::chain::HeaderFilterChain`,
//! `keepalive::reactor::Reactor`, `keepalive::pool::Balancer`) rather than
//! implemented here.

pub mod config;
pub mod error;
pub mod headers;
pub mod keepalive;
pub mod logging;
