use bytes::BytesMut;

use lber::common::TagClass;
use lber::parse::parse_tag;
use lber::structures::{ASNTag, OctetString, Sequence, Tag};
use lber::{write, IResult};

use super::{Exop, ExopParser};
use crate::error::{ErrorInfo, LdapError};

fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed password-modify response: {what}")))
}

pub const PASSMOD_OID: &str = "1.3.6.1.4.1.4203.1.11.1";

/// Password Modify extended operation ([RFC 3062](https://tools.ietf.org/html/rfc3062)).
///
/// `user_id` identifies whose password is being changed (defaults to the
/// bound identity if absent and may not be a DN); `old_pass` must match
/// the current password if the server requires it; if `new_pass` is
/// absent the server may generate one, returned in [`PasswordModifyResp`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasswordModify {
    pub user_id: Option<String>,
    pub old_pass: Option<String>,
    pub new_pass: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordModifyResp {
    pub gen_pass: Option<String>,
}

impl From<PasswordModify> for Exop {
    fn from(pm: PasswordModify) -> Exop {
        let mut pm_vec = Vec::new();
        if let Some(user_id) = pm.user_id {
            pm_vec.push(Tag::OctetString(OctetString { id: 0, class: TagClass::Context, inner: user_id.into_bytes() }));
        }
        if let Some(old_pass) = pm.old_pass {
            pm_vec.push(Tag::OctetString(OctetString { id: 1, class: TagClass::Context, inner: old_pass.into_bytes() }));
        }
        if let Some(new_pass) = pm.new_pass {
            pm_vec.push(Tag::OctetString(OctetString { id: 2, class: TagClass::Context, inner: new_pass.into_bytes() }));
        }
        let val = if pm_vec.is_empty() {
            None
        } else {
            let pm_val = Tag::Sequence(Sequence { inner: pm_vec, ..Default::default() }).into_structure();
            let mut buf = BytesMut::new();
            write::encode_into(&mut buf, pm_val).expect("BER encoding of in-memory structure cannot fail");
            Some(Vec::from(&buf[..]))
        };
        Exop { name: Some(PASSMOD_OID.to_owned()), val }
    }
}

impl ExopParser for PasswordModifyResp {
    fn parse(val: &[u8]) -> Result<PasswordModifyResp, LdapError> {
        if val.is_empty() {
            return Ok(PasswordModifyResp { gen_pass: None });
        }
        let tag = match parse_tag(val) {
            IResult::Done(_, tag) => tag,
            _ => return Err(protocol_error("BER value")),
        };
        let mut comps = tag.expect_constructed().ok_or_else(|| protocol_error("sequence"))?.into_iter();
        let gen_pass = comps
            .next()
            .ok_or_else(|| protocol_error("genPassword"))?
            .expect_primitive()
            .ok_or_else(|| protocol_error("genPassword"))?;
        Ok(PasswordModifyResp { gen_pass: Some(String::from_utf8_lossy(&gen_pass).into_owned()) })
    }
}
