use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structures::{ASNTag, Integer, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::IResult;

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};
use crate::error::LdapError;

pub const VLV_REQUEST_OID: &str = "2.16.840.1.113730.3.4.9";
pub const VLV_RESPONSE_OID: &str = "2.16.840.1.113730.3.4.10";

/// Which end of a [`ServerSideSorting`](super::ServerSideSorting)-ordered
/// result set a [`Vlv`] window is anchored to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VlvTarget {
    ByOffset { offset: i32, content_count: i32 },
    GreaterThanOrEqual(Vec<u8>),
}

/// Virtual List View control ([RFC 2891](https://tools.ietf.org/html/rfc2891)).
///
/// Must be combined with a [`ServerSideSorting`](super::ServerSideSorting)
/// control on the same request; requests a sliding window of
/// `before_count` + 1 + `after_count` entries around `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vlv {
    pub before_count: i32,
    pub after_count: i32,
    pub target: VlvTarget,
    pub context_id: Option<Vec<u8>>,
}

impl MakeCritical for Vlv {}

impl From<Vlv> for RawControl {
    fn from(vlv: Vlv) -> RawControl {
        let target = match vlv.target {
            VlvTarget::ByOffset { offset, content_count } => Tag::Sequence(Sequence {
                id: 0,
                class: TagClass::Context,
                inner: vec![
                    Tag::Integer(Integer { inner: offset as i64, ..Default::default() }),
                    Tag::Integer(Integer { inner: content_count as i64, ..Default::default() }),
                ],
            }),
            VlvTarget::GreaterThanOrEqual(v) => {
                Tag::OctetString(OctetString { id: 1, class: TagClass::Context, inner: v })
            }
        };
        let mut inner = vec![
            Tag::Integer(Integer { inner: vlv.before_count as i64, ..Default::default() }),
            Tag::Integer(Integer { inner: vlv.after_count as i64, ..Default::default() }),
            target,
        ];
        if let Some(ctx) = vlv.context_id {
            inner.push(Tag::OctetString(OctetString { inner: ctx, ..Default::default() }));
        }
        let cval = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        RawControl { ctype: VLV_REQUEST_OID.to_owned(), crit: true, val: Some(encode_tag(cval)) }
    }
}

/// Virtual List View response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VlvResponse {
    pub target_position: i32,
    pub content_count: i32,
    pub result: i32,
    pub context_id: Option<Vec<u8>>,
}

impl ControlParser for VlvResponse {
    fn parse(val: &[u8]) -> Result<VlvResponse, LdapError> {
        let mut comps = decode_tag(val)?
            .expect_constructed()
            .ok_or_else(|| protocol_error("VLV response components"))?
            .into_iter();
        let mut next_uint = || -> Result<i32, LdapError> {
            let bytes = comps
                .next()
                .ok_or_else(|| protocol_error("VLV response integer"))?
                .match_class(TagClass::Universal)
                .and_then(|t| t.match_id(Types::Integer as u64))
                .and_then(|t| t.expect_primitive())
                .ok_or_else(|| protocol_error("VLV response integer"))?;
            match parse_uint(bytes.as_slice()) {
                IResult::Done(_, v) => Ok(v as i32),
                _ => Err(protocol_error("VLV response integer")),
            }
        };
        let target_position = next_uint()?;
        let content_count = next_uint()?;
        let result = next_uint()?;
        let context_id = comps.next().and_then(|t| t.expect_primitive());
        Ok(VlvResponse { target_position, content_count, result, context_id })
    }
}
