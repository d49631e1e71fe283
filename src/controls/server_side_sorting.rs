use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::IResult;

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};
use crate::error::LdapError;

pub const SERVER_SIDE_SORTING_REQUEST_OID: &str = "1.2.840.113556.1.4.473";
pub const SERVER_SIDE_SORTING_RESPONSE_OID: &str = "1.2.840.113556.1.4.474";

/// One key of a [`ServerSideSorting`] request, in the original's
/// `["-"]attr[":"matchingrule]` shorthand (a leading `-` means descending).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub attr: String,
    pub matching_rule: Option<String>,
    pub reverse: bool,
}

impl SortKey {
    pub fn parse(spec: &str) -> SortKey {
        let (reverse, rest) = match spec.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        match rest.split_once(':') {
            Some((attr, rule)) => {
                SortKey { attr: attr.to_owned(), matching_rule: Some(rule.to_owned()), reverse }
            }
            None => SortKey { attr: rest.to_owned(), matching_rule: None, reverse },
        }
    }
}

/// Server-Side Sorting control ([RFC 2891](https://tools.ietf.org/html/rfc2891)).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSideSorting {
    pub keys: Vec<SortKey>,
}

impl MakeCritical for ServerSideSorting {}

impl From<ServerSideSorting> for RawControl {
    fn from(sss: ServerSideSorting) -> RawControl {
        let inner = sss
            .keys
            .into_iter()
            .map(|key| {
                let mut seq = vec![Tag::OctetString(OctetString {
                    inner: Vec::from(key.attr.as_bytes()),
                    ..Default::default()
                })];
                if let Some(rule) = key.matching_rule {
                    seq.push(Tag::OctetString(OctetString {
                        id: 0,
                        class: TagClass::Context,
                        inner: Vec::from(rule.as_bytes()),
                    }));
                }
                if key.reverse {
                    seq.push(Tag::Boolean(Boolean {
                        id: 1,
                        class: TagClass::Context,
                        inner: true,
                    }));
                }
                Tag::Sequence(Sequence { inner: seq, ..Default::default() })
            })
            .collect();
        let cval = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        RawControl {
            ctype: SERVER_SIDE_SORTING_REQUEST_OID.to_owned(),
            crit: false,
            val: Some(encode_tag(cval)),
        }
    }
}

/// Sort-Result response values, per RFC 2891 §1.2 (a subset of the LDAP
/// result code enumeration, reused for the sort outcome itself).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortResult {
    Success,
    Busy,
    Unwilling,
    NoSuchAttribute,
    InappropriateMatching,
    InsufficientAccessRights,
    AdminLimitExceeded,
    Other(i32),
}

impl From<i32> for SortResult {
    fn from(code: i32) -> SortResult {
        match code {
            0 => SortResult::Success,
            51 => SortResult::Busy,
            53 => SortResult::Unwilling,
            16 => SortResult::NoSuchAttribute,
            18 => SortResult::InappropriateMatching,
            50 => SortResult::InsufficientAccessRights,
            11 => SortResult::AdminLimitExceeded,
            other => SortResult::Other(other),
        }
    }
}

/// Server-Side Sorting response control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSideSortingResponse {
    pub result: SortResult,
    pub attr: Option<String>,
}

impl ControlParser for ServerSideSortingResponse {
    fn parse(val: &[u8]) -> Result<ServerSideSortingResponse, LdapError> {
        let mut comps = decode_tag(val)?
            .expect_constructed()
            .ok_or_else(|| protocol_error("sort result components"))?
            .into_iter();
        let result_bytes = comps
            .next()
            .ok_or_else(|| protocol_error("sort result code"))?
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Enumerated as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or_else(|| protocol_error("sort result code"))?;
        let result = match parse_uint(result_bytes.as_slice()) {
            IResult::Done(_, v) => SortResult::from(v as i32),
            _ => return Err(protocol_error("sort result code")),
        };
        let attr = comps
            .next()
            .and_then(|t| t.expect_primitive())
            .map(|b| String::from_utf8_lossy(&b).into_owned());
        Ok(ServerSideSortingResponse { result, attr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_shorthand_parses_reverse_and_matching_rule() {
        let key = SortKey::parse("-cn:caseIgnoreOrderingMatch");
        assert!(key.reverse);
        assert_eq!(key.attr, "cn");
        assert_eq!(key.matching_rule.as_deref(), Some("caseIgnoreOrderingMatch"));
    }

    #[test]
    fn sort_key_shorthand_plain_attr() {
        let key = SortKey::parse("sn");
        assert!(!key.reverse);
        assert_eq!(key.attr, "sn");
        assert!(key.matching_rule.is_none());
    }
}
