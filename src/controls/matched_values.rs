use super::{encode_tag, MakeCritical, RawControl};
use crate::filter::Filter;

pub const MATCHED_VALUES_OID: &str = "1.2.826.0.1.3344810.2.3";

/// Matched Values control ([RFC 3876](https://tools.ietf.org/html/rfc3876)).
///
/// Restricts which values of a multi-valued attribute are returned in a
/// search result entry to those matching `filter`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedValues {
    pub filter: Filter,
}

impl MatchedValues {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(filter: &str) -> Result<RawControl, crate::error::LdapError> {
        Ok(MatchedValues { filter: Filter::parse(filter)? }.into())
    }
}

impl MakeCritical for MatchedValues {}

impl From<MatchedValues> for RawControl {
    fn from(mv: MatchedValues) -> RawControl {
        let tag = mv.filter.to_tag();
        RawControl { ctype: MATCHED_VALUES_OID.to_owned(), crit: false, val: Some(encode_tag(tag)) }
    }
}
