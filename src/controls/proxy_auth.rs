use super::{Oid, RawControl};

pub const PROXY_AUTH_OID: &str = "2.16.840.1.113730.3.4.18";

/// Proxy Authorization control ([RFC 4370](https://tools.ietf.org/html/rfc4370)).
///
/// Only has a request part and must always be marked critical, so it
/// doesn't implement `MakeCritical` — there's no non-critical form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyAuth {
    /// Authorization identity, per RFC 4513 §5.2.1.8; empty for anonymous.
    pub authzid: String,
}

impl Oid for ProxyAuth {
    fn oid(&self) -> &'static str {
        PROXY_AUTH_OID
    }
}

impl From<ProxyAuth> for Option<Vec<u8>> {
    fn from(pa: ProxyAuth) -> Option<Vec<u8>> {
        Some(pa.authzid.into_bytes())
    }
}

impl From<ProxyAuth> for RawControl {
    fn from(pa: ProxyAuth) -> RawControl {
        RawControl { ctype: PROXY_AUTH_OID.to_owned(), crit: true, val: pa.into() }
    }
}
