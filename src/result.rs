//! Result wrappers (§3 "Result envelope", §4.F).
//!
//! [`LdapOpResult`] is the raw decoded `LDAPResult`/`LDAPMessage` shape
//! (message id, result code, diagnostics, protocol-op kind); [`Entry`]
//! wraps it together with the DN, attributes and controls a caller
//! actually wants.

use crate::attrs::Attributes;
use crate::controls::Control;
use crate::dn::Dn;

/// Which protocol operation a raw result came from, recorded so error
/// paths and logging can say something more specific than "a request
/// failed".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseType {
    Bind,
    Search,
    SearchResultEntry,
    SearchResultReference,
    Add,
    Delete,
    ModDn,
    Modify,
    Compare,
    Extended,
    IntermediateResponse,
}

/// The raw decoded `LDAPResult` (RFC 4511 §4.1.9) plus the framing
/// fields (`msgid`, protocol-op kind) needed to match it back to its
/// request and, for extended operations, its response name/value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LdapOpResult {
    pub msgid: i32,
    pub op: Option<ResponseType>,
    pub result_code: u8,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referral: Vec<String>,
    pub controls: Vec<Control>,
    /// `responseName` of an extended-operation response, if any.
    pub name: Option<String>,
    /// `responseValue` of an extended-operation response, if any.
    pub value: Option<Vec<u8>>,
}

impl LdapOpResult {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Request/response controls attached to an operation (§3 "Controls").
///
/// `server`/`client` are controls a caller attached to the request;
/// `response` are the ones the server sent back. `set_server` replaces
/// any existing control with the same OID (last-writer-wins);
/// `append_server` always adds, even alongside a duplicate OID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub server: Vec<Control>,
    pub client: Vec<Control>,
    pub response: Vec<Control>,
}

impl Controls {
    pub fn new() -> Controls {
        Controls::default()
    }

    /// Response control matching `oid`, if the server returned one.
    pub fn get(&self, oid: &str) -> Option<&Control> {
        self.response.iter().find(|c| c.ctype == oid)
    }

    /// Appends `control` to the server-control list unconditionally.
    pub fn append_server(&mut self, control: Control) {
        self.server.push(control);
    }

    /// Replaces any server control sharing `control`'s OID, then adds it.
    pub fn set_server(&mut self, control: Control) {
        self.server.retain(|c| c.ctype != control.ctype);
        self.server.push(control);
    }

    fn snapshot_request(&self) -> Controls {
        Controls { server: self.server.clone(), client: self.client.clone(), response: Vec::new() }
    }

    fn with_response(mut self, response: Vec<Control>) -> Controls {
        self.response = response;
        self
    }
}

/// Pagination metadata for one entry of a paginated search (§3 "Page info").
///
/// `page` and `entry` are both 1-indexed: `entry` is this entry's position
/// within its page, not a running count over the whole search. `results`/
/// `last_page` are populated only by Server-Side-Sorting + VLV paging;
/// Simple Paged Results leaves them `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub entry: u32,
    pub page_size: u32,
    pub results: Option<u32>,
    pub last_page: Option<u32>,
    is_last_in_page: bool,
}

impl Page {
    /// Builds per-entry page info. `entry` is this entry's 1-indexed
    /// position within `page`; `is_last_in_page` is set by the caller,
    /// which alone knows whether this was the final entry of the whole
    /// search (a short final page) as well as of a full one.
    pub fn new(page: u32, entry: u32, page_size: u32, is_last_in_page: bool) -> Page {
        Page { page, entry, page_size, results: None, last_page: None, is_last_in_page }
    }

    pub fn with_totals(mut self, results: Option<u32>, last_page: Option<u32>) -> Page {
        self.results = results;
        self.last_page = last_page;
        self
    }

    pub fn is_last_in_page(&self) -> bool {
        self.is_last_in_page
    }
}

/// The wrapped result of an operation: target DN, attributes (for
/// search results), and the controls exchanged with it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: Option<Dn>,
    pub attrs: Option<Attributes>,
    pub controls: Controls,
    pub page: Option<Page>,
    /// Decoded value of an extended-operation response, left to the
    /// caller to interpret via the appropriate `ExopParser`.
    pub extended_value: Option<Vec<u8>>,
}

impl Entry {
    /// Builds a wrapper from a decoded entry/op result, snapshotting
    /// `request_controls` (server + client, not yet carrying a response)
    /// alongside the response controls from `raw`.
    pub fn from_response(
        dn: Option<Dn>,
        attrs: Option<Attributes>,
        request_controls: &Controls,
        raw: &LdapOpResult,
    ) -> Entry {
        let controls = request_controls.snapshot_request().with_response(raw.controls.clone());
        Entry { dn, attrs, controls, page: None, extended_value: raw.value.clone() }
    }

    pub fn with_page(mut self, page: Page) -> Entry {
        self.page = Some(page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_last_in_page_reflects_caller_determination() {
        let p = Page::new(2, 5, 5, true);
        assert!(p.is_last_in_page());
        let p = Page::new(3, 3, 5, true);
        assert!(p.is_last_in_page());
        let p = Page::new(2, 3, 5, false);
        assert!(!p.is_last_in_page());
    }

    #[test]
    fn set_server_replaces_duplicate_oid_last_writer_wins() {
        let mut c = Controls::new();
        c.set_server(Control { ctype: "1.2.3".into(), crit: false, val: Some(vec![1]) });
        c.set_server(Control { ctype: "1.2.3".into(), crit: true, val: Some(vec![2]) });
        assert_eq!(c.server.len(), 1);
        assert_eq!(c.server[0].val, Some(vec![2]));
    }

    #[test]
    fn append_server_keeps_duplicate_oids() {
        let mut c = Controls::new();
        c.append_server(Control { ctype: "1.2.3".into(), crit: false, val: None });
        c.append_server(Control { ctype: "1.2.3".into(), crit: false, val: None });
        assert_eq!(c.server.len(), 2);
    }

    #[test]
    fn from_response_snapshots_request_controls_and_response() {
        let mut req = Controls::new();
        req.set_server(Control { ctype: "1.2.3".into(), crit: false, val: None });
        let raw = LdapOpResult { controls: vec![Control { ctype: "9.9.9".into(), crit: false, val: None }], ..Default::default() };
        let entry = Entry::from_response(None, None, &req, &raw);
        assert_eq!(entry.controls.server.len(), 1);
        assert_eq!(entry.controls.response.len(), 1);
        assert_eq!(entry.controls.response[0].ctype, "9.9.9");
    }
}
