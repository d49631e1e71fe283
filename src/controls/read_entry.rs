use lber::structures::{ASNTag, OctetString, Sequence, Tag};

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};
use crate::attrs::Attributes;
use crate::error::LdapError;

pub const PRE_READ_OID: &str = "1.3.6.1.1.13.1";
pub const POST_READ_OID: &str = "1.3.6.1.1.13.2";

struct ReadEntry<S> {
    attrs: Vec<S>,
    oid: &'static str,
}

fn from_read_entry<S: AsRef<str>>(re: ReadEntry<S>) -> RawControl {
    let inner = re
        .attrs
        .into_iter()
        .map(|attr| Tag::OctetString(OctetString { inner: Vec::from(attr.as_ref()), ..Default::default() }))
        .collect();
    let cval = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
    RawControl { ctype: re.oid.to_owned(), crit: false, val: Some(encode_tag(cval)) }
}

/// Pre-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)).
pub struct PreRead<S>(ReadEntry<S>);

impl<S: AsRef<str>> PreRead<S> {
    pub fn new(attrs: Vec<S>) -> RawControl {
        PreRead(ReadEntry { attrs, oid: PRE_READ_OID }).into()
    }
}

impl<S> MakeCritical for PreRead<S> {}

impl<S: AsRef<str>> From<PreRead<S>> for RawControl {
    fn from(pr: PreRead<S>) -> RawControl {
        from_read_entry(pr.0)
    }
}

/// Post-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)).
pub struct PostRead<S>(ReadEntry<S>);

impl<S: AsRef<str>> PostRead<S> {
    pub fn new(attrs: Vec<S>) -> RawControl {
        PostRead(ReadEntry { attrs, oid: POST_READ_OID }).into()
    }
}

impl<S> MakeCritical for PostRead<S> {}

impl<S: AsRef<str>> From<PostRead<S>> for RawControl {
    fn from(pr: PostRead<S>) -> RawControl {
        from_read_entry(pr.0)
    }
}

/// The entry snapshot carried by a Pre-Read or Post-Read response control;
/// the wire shape is identical for both, so one type serves both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadEntryResp {
    pub attrs: Attributes,
}

pub type PreReadResp = ReadEntryResp;
pub type PostReadResp = ReadEntryResp;

impl ControlParser for ReadEntryResp {
    fn parse(val: &[u8]) -> Result<ReadEntryResp, LdapError> {
        let tag = decode_tag(val)?;
        // SearchResultEntry-shaped: objectName, then PartialAttributeList.
        let mut comps =
            tag.expect_constructed().ok_or_else(|| protocol_error("read-entry response"))?.into_iter();
        comps.next(); // objectName, unused: caller already knows the target DN
        let attr_list =
            comps.next().ok_or_else(|| protocol_error("read-entry attribute list"))?;
        let mut attrs = Attributes::new();
        for pair in attr_list.expect_constructed().ok_or_else(|| protocol_error("attribute list"))? {
            let mut kv = pair.expect_constructed().ok_or_else(|| protocol_error("attribute pair"))?.into_iter();
            let name = String::from_utf8(
                kv.next().ok_or_else(|| protocol_error("attribute type"))?.expect_primitive().ok_or_else(|| protocol_error("attribute type"))?,
            )
            .map_err(|_| protocol_error("attribute type not UTF-8"))?;
            let values = kv
                .next()
                .ok_or_else(|| protocol_error("attribute values"))?
                .expect_constructed()
                .ok_or_else(|| protocol_error("attribute values"))?
                .into_iter()
                .map(|v| v.expect_primitive().ok_or_else(|| protocol_error("attribute value")))
                .collect::<Result<Vec<_>, _>>()?;
            attrs.insert(name, values);
        }
        Ok(ReadEntryResp { attrs })
    }
}
