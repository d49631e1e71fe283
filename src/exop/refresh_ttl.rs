use bytes::BytesMut;

use lber::common::TagClass;
use lber::parse::{parse_tag, parse_uint};
use lber::structures::{ASNTag, Integer, OctetString, Sequence, Tag};
use lber::{write, IResult};

use super::{Exop, ExopParser};
use crate::dn::Dn;
use crate::error::{ErrorInfo, LdapError};

pub const REFRESH_TTL_OID: &str = "1.3.6.1.4.1.4203.1.10.2";

fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed refresh response: {what}")))
}

/// Refresh extended operation ([RFC 2589](https://tools.ietf.org/html/rfc2589) §4).
///
/// Renews the time-to-live of a dynamic entry. `requested_ttl` of `None`
/// asks the server to pick a TTL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshTtl {
    pub entry_name: Dn,
    pub requested_ttl: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshTtlResp {
    pub response_ttl: i32,
}

impl From<RefreshTtl> for Exop {
    fn from(r: RefreshTtl) -> Exop {
        let mut inner = vec![Tag::OctetString(OctetString {
            inner: r.entry_name.to_string().into_bytes(),
            ..Default::default()
        })];
        if let Some(ttl) = r.requested_ttl {
            inner.push(Tag::Integer(Integer { id: 1, class: TagClass::Context, inner: ttl as i64 }));
        }
        let val = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, val).expect("BER encoding of in-memory structure cannot fail");
        Exop { name: Some(REFRESH_TTL_OID.to_owned()), val: Some(Vec::from(&buf[..])) }
    }
}

impl ExopParser for RefreshTtlResp {
    fn parse(val: &[u8]) -> Result<RefreshTtlResp, LdapError> {
        let tag = match parse_tag(val) {
            IResult::Done(_, tag) => tag,
            _ => return Err(protocol_error("BER value")),
        };
        let mut comps = tag.expect_constructed().ok_or_else(|| protocol_error("sequence"))?.into_iter();
        let ttl_bytes = comps
            .next()
            .ok_or_else(|| protocol_error("responseTtl"))?
            .match_class(TagClass::Context)
            .and_then(|t| t.match_id(1))
            .and_then(|t| t.expect_primitive())
            .ok_or_else(|| protocol_error("responseTtl"))?;
        let response_ttl = match parse_uint(ttl_bytes.as_slice()) {
            IResult::Done(_, v) => v as i32,
            _ => return Err(protocol_error("responseTtl")),
        };
        Ok(RefreshTtlResp { response_ttl })
    }
}
