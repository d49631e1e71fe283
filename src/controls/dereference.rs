use lber::structures::{ASNTag, OctetString, Sequence, Tag};

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};
use crate::attrs::Attributes;
use crate::error::LdapError;

pub const DEREFERENCE_OID: &str = "1.3.6.1.4.1.4203.666.5.16";

/// Dereference control (OpenLDAP extension, draft-masarati-ldap-deref).
///
/// For each attribute that is itself a DN-valued reference (e.g.
/// `member`), asks the server to also return the named entry's
/// `attributes` inline alongside the reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DereferenceAliases {
    /// `(reference attribute, attributes to pull from the dereferenced entry)`.
    pub specs: Vec<(String, Vec<String>)>,
}

impl MakeCritical for DereferenceAliases {}

impl From<DereferenceAliases> for RawControl {
    fn from(d: DereferenceAliases) -> RawControl {
        let inner = d
            .specs
            .into_iter()
            .map(|(deref_attr, attrs)| {
                let attr_tags = attrs
                    .into_iter()
                    .map(|a| Tag::OctetString(OctetString { inner: a.into_bytes(), ..Default::default() }))
                    .collect();
                Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString { inner: deref_attr.into_bytes(), ..Default::default() }),
                        Tag::Sequence(Sequence { inner: attr_tags, ..Default::default() }),
                    ],
                    ..Default::default()
                })
            })
            .collect();
        let cval = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        RawControl { ctype: DEREFERENCE_OID.to_owned(), crit: false, val: Some(encode_tag(cval)) }
    }
}

/// One dereferenced entry, as returned in a Dereference response control.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DereferencedEntry {
    pub deref_attr: String,
    pub dn: String,
    pub attrs: Attributes,
}

impl ControlParser for Vec<DereferencedEntry> {
    fn parse(val: &[u8]) -> Result<Vec<DereferencedEntry>, LdapError> {
        let entries = decode_tag(val)?
            .expect_constructed()
            .ok_or_else(|| protocol_error("dereference response"))?;
        let mut out = Vec::new();
        for entry in entries {
            let mut comps =
                entry.expect_constructed().ok_or_else(|| protocol_error("dereference entry"))?.into_iter();
            let deref_attr = String::from_utf8(
                comps.next().ok_or_else(|| protocol_error("derefAttr"))?.expect_primitive().ok_or_else(|| protocol_error("derefAttr"))?,
            )
            .map_err(|_| protocol_error("derefAttr not UTF-8"))?;
            let dn = String::from_utf8(
                comps.next().ok_or_else(|| protocol_error("dereference DN"))?.expect_primitive().ok_or_else(|| protocol_error("dereference DN"))?,
            )
            .map_err(|_| protocol_error("dereference DN not UTF-8"))?;
            let mut attrs = Attributes::new();
            if let Some(attr_list) = comps.next() {
                for pair in attr_list.expect_constructed().ok_or_else(|| protocol_error("attribute list"))? {
                    let mut kv =
                        pair.expect_constructed().ok_or_else(|| protocol_error("attribute pair"))?.into_iter();
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
            }
            out.push(DereferencedEntry { deref_attr, dn, attrs });
        }
        Ok(out)
    }
}
