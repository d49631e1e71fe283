//! Extended operation request/response framing (RFC 4511 §4.12).

use lber::common::TagClass;
use lber::structures::{OctetString, Tag};

use crate::error::LdapError;

mod end_transaction;
mod passmod;
mod refresh_ttl;
mod start_transaction;
mod starttls;
mod whoami;

pub use end_transaction::{EndTransaction, ABORTED_TRANSACTION_NOTICE_OID};
pub use passmod::{PasswordModify, PasswordModifyResp};
pub use refresh_ttl::{RefreshTtl, RefreshTtlResp};
pub use start_transaction::{StartTransaction, StartTransactionResp};
pub(crate) use starttls::StartTls;
pub use whoami::{WhoAmI, WhoAmIResp};

/// An extended operation request/response value: an OID name plus an
/// opaque payload (absent for operations with no request/response data).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Exop {
    pub name: Option<String>,
    pub val: Option<Vec<u8>>,
}

/// Decodes an extended operation's opaque response value.
pub trait ExopParser: Sized {
    fn parse(val: &[u8]) -> Result<Self, LdapError>;
}

pub fn parse_exop<T: ExopParser>(val: &[u8]) -> Result<T, LdapError> {
    T::parse(val)
}

pub fn construct_exop(exop: Exop) -> Vec<Tag> {
    let name = exop.name.expect("extended operation request always carries a requestName");
    let mut seq = vec![Tag::OctetString(OctetString { id: 0, class: TagClass::Context, inner: name.into_bytes() })];
    if let Some(val) = exop.val {
        seq.push(Tag::OctetString(OctetString { id: 1, class: TagClass::Context, inner: val }));
    }
    seq
}
