use super::{MakeCritical, RawControl};

pub const MANAGE_DSA_IT_OID: &str = "2.16.840.1.113730.3.4.2";

/// ManageDsaIT control ([RFC 3296](https://tools.ietf.org/html/rfc3296)).
///
/// Tells the server to treat referral/alias objects as ordinary entries
/// instead of following or dereferencing them. Request-only.
pub struct ManageDsaIt;

impl MakeCritical for ManageDsaIt {}

impl From<ManageDsaIt> for RawControl {
    fn from(_mdi: ManageDsaIt) -> RawControl {
        RawControl { ctype: MANAGE_DSA_IT_OID.to_owned(), crit: false, val: None }
    }
}
