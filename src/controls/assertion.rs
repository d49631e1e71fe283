use super::{encode_tag, MakeCritical, RawControl};
use crate::filter::Filter;

pub const ASSERTION_OID: &str = "1.3.6.1.1.12";

/// Assertion control ([RFC 4528](https://tools.ietf.org/html/rfc4528)).
///
/// Makes the enclosing operation conditional on `filter` matching the
/// target entry; the server returns `AssertionFailed` if it doesn't.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assertion {
    pub filter: Filter,
}

impl Assertion {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(filter: &str) -> Result<RawControl, crate::error::LdapError> {
        Ok(Assertion { filter: Filter::parse(filter)? }.into())
    }
}

impl MakeCritical for Assertion {}

impl From<Assertion> for RawControl {
    fn from(assn: Assertion) -> RawControl {
        let tag = assn.filter.to_tag();
        RawControl { ctype: ASSERTION_OID.to_owned(), crit: false, val: Some(encode_tag(tag)) }
    }
}
