use bytes::BytesMut;

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};

use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structures::{ASNTag, Integer, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::IResult;

pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Simple Paged Results control ([RFC 2696](https://tools.ietf.org/html/rfc2696)).
///
/// Used for both requests and responses, although `size` means different
/// things in each case: for a request it's the desired page size, for a
/// response it's the server's (possibly zero, meaning "unknown") estimate
/// of the total result count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagedResults {
    pub size: i32,
    pub cookie: Vec<u8>,
}

impl MakeCritical for PagedResults {}

impl From<PagedResults> for RawControl {
    fn from(pr: PagedResults) -> RawControl {
        let cval = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer { inner: pr.size as i64, ..Default::default() }),
                Tag::OctetString(OctetString { inner: pr.cookie, ..Default::default() }),
            ],
            ..Default::default()
        })
        .into_structure();
        RawControl { ctype: PAGED_RESULTS_OID.to_owned(), crit: false, val: Some(encode_tag(cval)) }
    }
}

impl ControlParser for PagedResults {
    fn parse(val: &[u8]) -> Result<PagedResults, crate::error::LdapError> {
        let mut comps = decode_tag(val)?
            .expect_constructed()
            .ok_or_else(|| protocol_error("paged results components"))?
            .into_iter();
        let size_tag = comps.next().ok_or_else(|| protocol_error("paged results size"))?;
        let size_bytes = size_tag
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Integer as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or_else(|| protocol_error("paged results size"))?;
        let size = match parse_uint(size_bytes.as_slice()) {
            IResult::Done(_, size) => size as i32,
            _ => return Err(protocol_error("paged results size")),
        };
        let cookie = comps
            .next()
            .ok_or_else(|| protocol_error("paged results cookie"))?
            .expect_primitive()
            .ok_or_else(|| protocol_error("paged results cookie"))?;
        Ok(PagedResults { size, cookie })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_the_wire_form() {
        let pr = PagedResults { size: 50, cookie: b"cookie".to_vec() };
        let raw: RawControl = pr.into();
        assert_eq!(raw.ctype, PAGED_RESULTS_OID);
        let decoded = PagedResults::parse(&raw.val.unwrap()).unwrap();
        assert_eq!(decoded.size, 50);
        assert_eq!(decoded.cookie, b"cookie");
    }
}
