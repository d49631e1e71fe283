//! Request/response control framing (RFC 4511 §4.1.11).
//!
//! Each concrete control lives in its own submodule, following the
//! wire-level shape of an LDAP `Control`: an OID, a criticality flag, and
//! an optional opaque `controlValue`. [`RawControl`] is that shape;
//! concrete controls convert to and from it via `From`/[`ControlParser`].

use bytes::BytesMut;
use lber::common::TagClass;
use lber::parse::parse_tag;
use lber::structure::{PL, StructureTag};
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::{write, IResult};

use crate::error::{ErrorInfo, LdapError};

mod assertion;
mod authz_identity;
mod dereference;
mod effective_rights;
mod manage_dsa_it;
mod matched_values;
mod paged_results;
mod persistent_search;
mod proxy_auth;
mod read_entry;
mod relax_rules;
mod server_side_sorting;
mod session_tracking;
mod transaction_spec;
mod vlv;

pub use assertion::Assertion;
pub use authz_identity::{AuthorizationIdentity, AuthorizationIdentityResponse};
pub use dereference::{DereferenceAliases, DereferencedEntry};
pub use effective_rights::GetEffectiveRights;
pub use manage_dsa_it::ManageDsaIt;
pub use matched_values::MatchedValues;
pub use paged_results::{PagedResults, PAGED_RESULTS_OID};
pub use persistent_search::{ChangeType, EntryChangeNotification, PersistentSearch};
pub use proxy_auth::ProxyAuth;
pub use read_entry::{PostRead, PostReadResp, PreRead, PreReadResp, ReadEntryResp};
pub use relax_rules::RelaxRules;
pub use server_side_sorting::{ServerSideSorting, ServerSideSortingResponse, SortKey, SortResult};
pub use session_tracking::SessionTracking;
pub use transaction_spec::TransactionSpecification;
pub use vlv::{Vlv, VlvResponse, VlvTarget, VLV_RESPONSE_OID};

/// A control type that carries its own OID.
pub trait Oid {
    fn oid(&self) -> &'static str;
}

/// Decodes a control's opaque `controlValue`.
pub trait ControlParser: Sized {
    fn parse(val: &[u8]) -> Result<Self, LdapError>;
}

pub fn parse_control<T: ControlParser>(val: &[u8]) -> Result<T, LdapError> {
    T::parse(val)
}

/// Wraps a control builder to mark it critical: `PagedResults { .. }.critical()`.
pub trait MakeCritical: Sized {
    fn critical(self) -> CriticalControl<Self> {
        CriticalControl { control: self }
    }
}

pub struct CriticalControl<T> {
    control: T,
}

impl<T> From<CriticalControl<T>> for RawControl
where
    T: Oid,
    Option<Vec<u8>>: From<T>,
{
    fn from(cc: CriticalControl<T>) -> RawControl {
        let oid = cc.control.oid();
        RawControl { ctype: oid.to_owned(), crit: true, val: cc.control.into() }
    }
}

/// The wire shape of a control: OID, criticality, opaque value. Used both
/// for controls a caller constructs to send, and for controls decoded off
/// a server response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawControl {
    pub ctype: String,
    pub crit: bool,
    pub val: Option<Vec<u8>>,
}

/// Alias used when referring to a control received in a response, to read
/// more naturally at call sites (`ErrorInfo::controls: Vec<Control>`).
pub type Control = RawControl;

impl From<RawControl> for StructureTag {
    fn from(ctrl: RawControl) -> StructureTag {
        construct_control(&ctrl.ctype, ctrl.crit, ctrl.val)
    }
}

pub fn construct_control(oid: &str, crit: bool, val: Option<Vec<u8>>) -> StructureTag {
    let mut seq = vec![Tag::OctetString(OctetString {
        inner: Vec::from(oid.as_bytes()),
        ..Default::default()
    })];
    if crit {
        seq.push(Tag::Boolean(Boolean { inner: true, ..Default::default() }));
    }
    if let Some(val) = val {
        seq.push(Tag::OctetString(OctetString { inner: val, ..Default::default() }));
    }
    Tag::Sequence(Sequence { inner: seq, ..Default::default() }).into_structure()
}

/// Encode a list of controls as the `SEQUENCE OF Control` body; the caller
/// wraps the result in the `[0]` context tag of the enclosing LDAPMessage.
pub fn encode_controls(ctrls: Vec<RawControl>) -> StructureTag {
    let inner = ctrls.into_iter().map(StructureTag::from).collect();
    Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure()
}

/// Decode a `SEQUENCE OF Control`, as found in an LDAPMessage's `[0]` field.
pub fn parse_controls(t: StructureTag) -> Result<Vec<Control>, LdapError> {
    let tags = t
        .expect_constructed()
        .ok_or_else(|| protocol_error("controls sequence"))?
        .into_iter();
    let mut ctrls = Vec::new();
    for ctrl in tags {
        let mut components = ctrl
            .expect_constructed()
            .ok_or_else(|| protocol_error("control components"))?
            .into_iter();
        let ctype_tag = components.next().ok_or_else(|| protocol_error("controlType"))?;
        let ctype = String::from_utf8(
            ctype_tag.expect_primitive().ok_or_else(|| protocol_error("controlType octet string"))?,
        )
        .map_err(|_| protocol_error("controlType not UTF-8"))?;
        let next = components.next();
        let (crit, maybe_val) = match next {
            None => (false, None),
            Some(c) => match c {
                StructureTag { id, payload: PL::P(ref v), .. } if id == Types::Boolean as u64 => {
                    (v.first().copied().unwrap_or(0) != 0, components.next())
                }
                StructureTag { id, .. } if id == Types::OctetString as u64 => (false, Some(c)),
                _ => return Err(protocol_error("control criticality/value")),
            },
        };
        let val = match maybe_val {
            None => None,
            Some(v) => Some(v.expect_primitive().ok_or_else(|| protocol_error("controlValue"))?),
        };
        ctrls.push(RawControl { ctype, crit, val });
    }
    Ok(ctrls)
}

pub(crate) fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed control: {what}")))
}

pub(crate) fn decode_tag(val: &[u8]) -> Result<StructureTag, LdapError> {
    match parse_tag(val) {
        IResult::Done(_, tag) => Ok(tag),
        _ => Err(protocol_error("BER value")),
    }
}

pub(crate) fn encode_tag(tag: StructureTag) -> Vec<u8> {
    let mut buf = BytesMut::new();
    write::encode_into(&mut buf, tag).expect("BER encoding of in-memory structure cannot fail");
    Vec::from(&buf[..])
}
