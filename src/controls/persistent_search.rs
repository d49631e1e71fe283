use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structures::{ASNTag, Boolean, Integer, Sequence, Tag};
use lber::universal::Types;
use lber::IResult;

use super::{decode_tag, encode_tag, protocol_error, ControlParser, MakeCritical, RawControl};
use crate::error::LdapError;

pub const PERSISTENT_SEARCH_OID: &str = "2.16.840.1.113730.3.4.3";
pub const ENTRY_CHANGE_NOTIFICATION_OID: &str = "2.16.840.1.113730.3.4.7";

/// The kind of change an [`EntryChangeNotification`] reports, a bitmask
/// per the original protocol draft (`psearch`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Add = 1,
    Delete = 2,
    Modify = 4,
    ModDn = 8,
}

impl ChangeType {
    fn from_bits(bits: i32) -> Option<ChangeType> {
        match bits {
            1 => Some(ChangeType::Add),
            2 => Some(ChangeType::Delete),
            4 => Some(ChangeType::Modify),
            8 => Some(ChangeType::ModDn),
            _ => None,
        }
    }
}

/// Persistent Search control (draft-ietf-ldapext-psearch).
///
/// Turns a search into a standing subscription: the initial result set is
/// followed by [`EntryChangeNotification`]-annotated entries as changes
/// happen, until the client abandons the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentSearch {
    pub change_types: Vec<ChangeType>,
    pub changes_only: bool,
    pub return_entry_change_controls: bool,
}

impl MakeCritical for PersistentSearch {}

impl From<PersistentSearch> for RawControl {
    fn from(ps: PersistentSearch) -> RawControl {
        let mask = ps.change_types.iter().fold(0i64, |acc, ct| acc | (*ct as i64));
        let cval = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer { inner: mask, ..Default::default() }),
                Tag::Boolean(Boolean { inner: ps.changes_only, ..Default::default() }),
                Tag::Boolean(Boolean { inner: ps.return_entry_change_controls, ..Default::default() }),
            ],
            ..Default::default()
        })
        .into_structure();
        RawControl { ctype: PERSISTENT_SEARCH_OID.to_owned(), crit: true, val: Some(encode_tag(cval)) }
    }
}

/// Entry Change Notification response control, attached to each entry a
/// [`PersistentSearch`] delivers after the initial result set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryChangeNotification {
    pub change_type: Option<ChangeType>,
    pub previous_dn: Option<String>,
    pub change_number: Option<i64>,
}

impl ControlParser for EntryChangeNotification {
    fn parse(val: &[u8]) -> Result<EntryChangeNotification, LdapError> {
        let mut comps = decode_tag(val)?
            .expect_constructed()
            .ok_or_else(|| protocol_error("entry change notification"))?
            .into_iter();
        let ct_bytes = comps
            .next()
            .ok_or_else(|| protocol_error("changeType"))?
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Enumerated as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or_else(|| protocol_error("changeType"))?;
        let change_type = match parse_uint(ct_bytes.as_slice()) {
            IResult::Done(_, v) => ChangeType::from_bits(v as i32),
            _ => return Err(protocol_error("changeType")),
        };
        let previous_dn = comps.next().and_then(|t| t.expect_primitive()).map(|b| String::from_utf8_lossy(&b).into_owned());
        let change_number = comps.next().and_then(|t| t.expect_primitive()).and_then(|b| match parse_uint(&b) {
            IResult::Done(_, v) => Some(v as i64),
            _ => None,
        });
        Ok(EntryChangeNotification { change_type, previous_dn, change_number })
    }
}
