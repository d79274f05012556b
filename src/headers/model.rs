//! Header list and typed-slot data model.
//!
//! Ports the C source's offset-into-struct typed fields to an arena-backed
//! list (`Vec<HeaderEntry>`) plus `Option<usize>` slot indices, per the
//! "Typed-slot back-references" design note: no pointer arithmetic, just an
//! index into the shared list and a variant tag naming which recognized
//! header the index belongs to.

use std::collections::HashMap;

/// A single header line. `hash == 0` marks a tombstoned entry that
/// downstream emitters must skip; `hash == 1` marks a live entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
    pub hash: u32,
}

impl HeaderEntry {
    fn live(key: impl Into<String>, value: impl Into<String>) -> Self {
        HeaderEntry {
            key: key.into(),
            value: value.into(),
            hash: 1,
        }
    }
}

/// The arena all typed slots and multi-slots index into.
#[derive(Clone, Debug, Default)]
pub struct HeaderList {
    entries: Vec<HeaderEntry>,
}

impl HeaderList {
    pub fn new() -> Self {
        HeaderList::default()
    }

    /// Appends a live entry and returns its index.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> usize {
        self.entries.push(HeaderEntry::live(key, value));
        self.entries.len() - 1
    }

    pub fn get(&self, idx: usize) -> Option<&HeaderEntry> {
        self.entries.get(idx)
    }

    /// Tombstones the entry so emitters skip it; the slot still exists but
    /// is no longer "live" per the hash=0 invariant.
    pub fn tombstone(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.hash = 0;
        }
    }

    pub fn set_value(&mut self, idx: usize, value: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.value = value.into();
        }
    }

    /// Iterates over live (hash != 0) entries in list order.
    pub fn iter_live(&self) -> impl Iterator<Item = (usize, &HeaderEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.hash != 0)
    }

    /// Wildcard deletion: `prefix` is the rule key with the trailing `*`
    /// stripped. Tombstones every live entry whose key case-insensitively
    /// starts with `prefix`, overwriting its value with the empty string to
    /// match the source's `ngx_http_add_header` wildcard path. Returns the
    /// indices that were tombstoned so callers can drop any slot references.
    pub fn delete_matching_wildcard(&mut self, prefix: &str) -> Vec<usize> {
        let mut touched = Vec::new();
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            if entry.hash != 0 && entry.key.len() >= prefix.len() {
                let entry_prefix = &entry.key[..prefix.len()];
                if entry_prefix.eq_ignore_ascii_case(prefix) {
                    entry.hash = 0;
                    entry.value.clear();
                    touched.push(idx);
                }
            }
        }
        touched
    }
}

/// A back-reference to a single-valued recognized header (e.g.
/// `Content-Encoding`). Empty means "not set"; non-empty always points at a
/// live (`hash == 1`) entry with the same key.
pub type TypedSlot = Option<usize>;

/// A back-reference array for headers that may legitimately repeat.
pub type MultiSlot = Vec<usize>;

/// Recognized response headers dispatched through `SET_TYPED` with no side
/// channel beyond the list entry itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypedResponseHeader {
    Server,
    Date,
    ContentEncoding,
    Location,
    Refresh,
    ContentRange,
    WwwAuthenticate,
    Expires,
    ETag,
}

/// Recognized response headers dispatched through `ADD_MULTI`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MultiResponseHeader {
    Link,
    CacheControl,
}

/// Response-side view: the generic list plus the recognized fast-path
/// fields the source keeps in `ngx_http_headers_out_t`.
#[derive(Clone, Debug, Default)]
pub struct ResponseHeaders {
    pub list: HeaderList,
    pub status: u16,

    typed: HashMap<TypedResponseHeader, usize>,
    multi: HashMap<MultiResponseHeader, MultiSlot>,

    pub last_modified: TypedSlot,
    /// Unix seconds, or `-1` when unset, matching `r->headers_out.last_modified_time`.
    pub last_modified_time: i64,

    pub accept_ranges: TypedSlot,
    pub allow_ranges: bool,

    pub content_length: TypedSlot,
    /// `-1` when unset, matching `r->headers_out.content_length_n`.
    pub content_length_n: i64,

    /// `Content-Type` never goes through the generic list (source note:
    /// "never touches the header list").
    pub content_type: String,
    pub charset: String,
    pub content_type_len: usize,
}

impl ResponseHeaders {
    pub fn new(status: u16) -> Self {
        ResponseHeaders {
            status,
            last_modified_time: -1,
            content_length_n: -1,
            ..Default::default()
        }
    }

    pub fn typed_slot(&self, header: TypedResponseHeader) -> TypedSlot {
        self.typed.get(&header).copied()
    }

    /// Upserts a typed slot: if already set, tombstones the old entry first
    /// (the source overwrites in place; we model that as tombstone + push
    /// for a single consistent invariant: "at most one live entry per
    /// recognized typed header").
    pub fn set_typed(&mut self, header: TypedResponseHeader, key: &str, value: &str) {
        if let Some(old) = self.typed.get(&header).copied() {
            self.list.tombstone(old);
        }
        let idx = self.list.push(key, value);
        self.typed.insert(header, idx);
    }

    pub fn clear_typed(&mut self, header: TypedResponseHeader) {
        if let Some(old) = self.typed.remove(&header) {
            self.list.tombstone(old);
        }
    }

    pub fn add_multi(&mut self, header: MultiResponseHeader, key: &str, value: &str) {
        let idx = self.list.push(key, value);
        self.multi.entry(header).or_default().push(idx);
    }

    pub fn multi_slot(&self, header: MultiResponseHeader) -> &[usize] {
        self.multi.get(&header).map_or(&[], |v| v.as_slice())
    }

    /// Drops slot references into any index that was just tombstoned by a
    /// wildcard delete, keeping typed/multi slots consistent with the list.
    pub fn drop_tombstoned(&mut self, tombstoned: &[usize]) {
        self.typed.retain(|_, idx| !tombstoned.contains(idx));
        for slots in self.multi.values_mut() {
            slots.retain(|idx| !tombstoned.contains(idx));
        }
    }

    /// `SET_LAST_MODIFIED`: as a typed slot, plus the parsed
    /// `last_modified_time` side channel (`-1` when cleared).
    pub fn set_last_modified(&mut self, key: &str, value: &str, time: i64) {
        if let Some(old) = self.last_modified.take() {
            self.list.tombstone(old);
        }
        self.last_modified = Some(self.list.push(key, value));
        self.last_modified_time = time;
    }

    pub fn clear_last_modified(&mut self) {
        if let Some(old) = self.last_modified.take() {
            self.list.tombstone(old);
        }
        self.last_modified_time = -1;
    }

    /// `SET_ACCEPT_RANGES`: as a typed slot, plus the `allow_ranges`
    /// capability flag.
    pub fn set_accept_ranges(&mut self, key: &str, value: &str) {
        if let Some(old) = self.accept_ranges.take() {
            self.list.tombstone(old);
        }
        self.accept_ranges = Some(self.list.push(key, value));
        self.allow_ranges = true;
    }

    pub fn clear_accept_ranges(&mut self) {
        if let Some(old) = self.accept_ranges.take() {
            self.list.tombstone(old);
        }
        self.allow_ranges = false;
    }

    /// `SET_CONTENT_LENGTH`: as a typed slot, plus the parsed
    /// `content_length_n` side channel (`-1` when cleared).
    pub fn set_content_length(&mut self, key: &str, value: &str, n: i64) {
        if let Some(old) = self.content_length.take() {
            self.list.tombstone(old);
        }
        self.content_length = Some(self.list.push(key, value));
        self.content_length_n = n;
    }

    pub fn clear_content_length(&mut self) {
        if let Some(old) = self.content_length.take() {
            self.list.tombstone(old);
        }
        self.content_length_n = -1;
    }

    /// `SET_CONTENT_TYPE`: never touches the header list, per the source's
    /// own note; `type_len`/`charset` are computed by
    /// `rule::parse_content_type` and handed in here.
    pub fn set_content_type(&mut self, value: &str, type_len: usize, charset: Option<String>) {
        self.content_type = value.to_string();
        self.content_type_len = type_len;
        self.charset = charset.unwrap_or_default();
    }

    pub fn clear_content_type(&mut self) {
        self.content_type.clear();
        self.content_type_len = 0;
        self.charset.clear();
    }
}

/// Recognized request headers with no dedicated side channel, dispatched
/// through `SET_GENERIC_REQ`-family handlers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypedRequestHeader {
    Host,
    Connection,
    UserAgent,
    Referer,
    ContentLength,
    ContentRange,
    ContentType,
    Range,
    IfRange,
    TransferEncoding,
    Te,
    Expect,
    Upgrade,
    AcceptEncoding,
    Via,
    Authorization,
    KeepAlive,
    XRealIp,
    Accept,
    AcceptLanguage,
    Depth,
    Destination,
    Overwrite,
    Date,
    IfMatch,
    IfModifiedSince,
    IfNoneMatch,
    IfUnmodifiedSince,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MultiRequestHeader {
    XForwardedFor,
    Cookie,
}

/// Connection classification set by `SET_CONN_REQ`, mirroring
/// `r->headers_in.connection_type`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    #[default]
    Unset,
    Close,
    KeepAlive,
}

/// Browser classification flags set by `SET_UA_REQ`, mirroring
/// `ngx_http_set_user_agent_header`'s `msie`/`opera`/... bitfields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrowserFlags {
    pub msie: bool,
    pub msie6: bool,
    pub opera: bool,
    pub gecko: bool,
    pub chrome: bool,
    pub safari: bool,
    pub konqueror: bool,
}

/// Request-side view, symmetric with `ResponseHeaders`.
#[derive(Clone, Debug, Default)]
pub struct RequestHeaders {
    pub list: HeaderList,

    typed: HashMap<TypedRequestHeader, usize>,
    multi: HashMap<MultiRequestHeader, MultiSlot>,

    /// Validated/normalized form set by `SET_HOST_REQ`, `None` until a rule
    /// sets it.
    pub validated_host: Option<String>,
    pub connection_type: ConnectionType,
    pub browser: BrowserFlags,
    pub content_length_n: i64,
}

impl RequestHeaders {
    pub fn new() -> Self {
        RequestHeaders {
            content_length_n: -1,
            ..Default::default()
        }
    }

    pub fn typed_slot(&self, header: TypedRequestHeader) -> TypedSlot {
        self.typed.get(&header).copied()
    }

    pub fn set_typed(&mut self, header: TypedRequestHeader, key: &str, value: &str) {
        if let Some(old) = self.typed.get(&header).copied() {
            self.list.tombstone(old);
        }
        let idx = self.list.push(key, value);
        self.typed.insert(header, idx);
    }

    pub fn clear_typed(&mut self, header: TypedRequestHeader) {
        if let Some(old) = self.typed.remove(&header) {
            self.list.tombstone(old);
        }
    }

    pub fn add_multi(&mut self, header: MultiRequestHeader, key: &str, value: &str) {
        let idx = self.list.push(key, value);
        self.multi.entry(header).or_default().push(idx);
    }

    pub fn multi_slot(&self, header: MultiRequestHeader) -> &[usize] {
        self.multi.get(&header).map_or(&[], |v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_typed_tombstones_previous_entry() {
        let mut resp = ResponseHeaders::new(200);
        resp.set_typed(TypedResponseHeader::Server, "Server", "a");
        let first = resp.typed_slot(TypedResponseHeader::Server).unwrap();
        resp.set_typed(TypedResponseHeader::Server, "Server", "b");
        let second = resp.typed_slot(TypedResponseHeader::Server).unwrap();

        assert_ne!(first, second);
        assert_eq!(resp.list.get(first).unwrap().hash, 0);
        assert_eq!(resp.list.get(second).unwrap().value, "b");
    }

    #[test]
    fn wildcard_delete_tombstones_prefix_matches_case_insensitively() {
        let mut list = HeaderList::new();
        let a = list.push("X-Debug-Foo", "1");
        let b = list.push("x-debug-bar", "2");
        let c = list.push("X-Other", "3");

        let touched = list.delete_matching_wildcard("x-debug-");

        assert!(touched.contains(&a));
        assert!(touched.contains(&b));
        assert!(!touched.contains(&c));
        assert_eq!(list.get(a).unwrap().hash, 0);
        assert_eq!(list.get(c).unwrap().hash, 1);
    }

    #[test]
    fn multi_slot_accumulates_in_list_order() {
        let mut resp = ResponseHeaders::new(200);
        resp.add_multi(MultiResponseHeader::Link, "Link", "</a>; rel=preload");
        resp.add_multi(MultiResponseHeader::Link, "Link", "</b>; rel=preload");

        let slots = resp.multi_slot(MultiResponseHeader::Link);
        assert_eq!(slots.len(), 2);
        assert_eq!(resp.list.get(slots[0]).unwrap().value, "</a>; rel=preload");
    }

    #[test]
    fn drop_tombstoned_clears_matching_typed_and_multi_slots() {
        let mut resp = ResponseHeaders::new(200);
        resp.set_typed(TypedResponseHeader::Server, "Server", "a");
        resp.add_multi(MultiResponseHeader::Link, "Link", "</a>");
        let tombstoned = resp.list.delete_matching_wildcard("s");
        resp.drop_tombstoned(&tombstoned);
        assert!(resp.typed_slot(TypedResponseHeader::Server).is_none());
    }
}
