//! LDAPMessage envelope and wire codec (RFC 4511 §4.1.1).
//!
//! `LdapCodec` frames raw TCP bytes into decoded [`ProtoOp`]s and encodes
//! outgoing [`Request`]s; it owns no connection state beyond what's needed
//! to strip/attach the `LDAPMessage SEQUENCE { messageID, protocolOp,
//! controls [0] }` envelope. Message-id allocation and demultiplexing
//! responses to waiting callers lives in [`crate::conn`].

use bytes::{Buf, BufMut, BytesMut};
use lber::common::TagClass;
use lber::parse::{parse_tag, parse_uint};
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Integer, Sequence, Tag};
use lber::{write, IResult};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ErrorInfo, LdapError};

fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed LDAPMessage: {what}")))
}

/// A decoded `LDAPMessage`: message id, the protocol-op tag (still in its
/// raw BER shape; `conn` decodes it further based on its application tag
/// number), and the optional `[0]` controls sequence.
#[derive(Debug)]
pub struct ProtoOp {
    pub msgid: i32,
    pub op: StructureTag,
    pub controls: Option<StructureTag>,
}

/// An outgoing request: its already application-tagged `protocolOp` plus
/// the controls to attach, keyed under the message id the caller
/// allocated for it.
pub struct Request {
    pub msgid: i32,
    pub op: Tag,
    pub controls: Option<StructureTag>,
}

/// Frames the LDAP wire protocol on top of a byte stream. BER length
/// prefixes make the protocol self-delimiting, so `decode` parses one
/// complete `LDAPMessage` per call and leaves a trailing partial message
/// in the buffer for the next read.
#[derive(Default)]
pub struct LdapCodec;

impl Decoder for LdapCodec {
    type Item = ProtoOp;
    type Error = LdapError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ProtoOp>, LdapError> {
        let (consumed, tag) = match parse_tag(&buf[..]) {
            IResult::Done(rest, tag) => (buf.len() - rest.len(), tag),
            IResult::Incomplete(_) => return Ok(None),
            IResult::Error(_) => return Err(protocol_error("BER envelope")),
        };
        buf.advance(consumed);
        let mut components = tag
            .expect_constructed()
            .ok_or_else(|| protocol_error("LDAPMessage sequence"))?
            .into_iter();
        let msgid_tag = components.next().ok_or_else(|| protocol_error("messageID"))?;
        let msgid_bytes =
            msgid_tag.expect_primitive().ok_or_else(|| protocol_error("messageID integer"))?;
        let msgid = match parse_uint(&msgid_bytes) {
            IResult::Done(_, v) => v as i32,
            _ => return Err(protocol_error("messageID value")),
        };
        let op = components.next().ok_or_else(|| protocol_error("protocolOp"))?;
        let controls = components.next();
        Ok(Some(ProtoOp { msgid, op, controls }))
    }
}

impl Encoder<Request> for LdapCodec {
    type Error = LdapError;

    fn encode(&mut self, req: Request, buf: &mut BytesMut) -> Result<(), LdapError> {
        let mut inner =
            vec![Tag::Integer(Integer { inner: req.msgid as i64, ..Default::default() }), req.op];
        if let Some(controls) = req.controls {
            inner.push(Tag::StructureTag(StructureTag {
                class: TagClass::Context,
                id: 0,
                payload: controls.payload,
            }));
        }
        let envelope = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        let mut out = BytesMut::new();
        write::encode_into(&mut out, envelope)
            .map_err(|_| protocol_error("encoding outgoing message"))?;
        buf.reserve(out.len());
        buf.put_slice(&out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lber::structures::OctetString;

    #[test]
    fn round_trips_a_simple_message() {
        let mut buf = BytesMut::new();
        let mut codec = LdapCodec;
        let op = Tag::OctetString(OctetString { inner: b"hello".to_vec(), ..Default::default() });
        codec.encode(Request { msgid: 7, op, controls: None }, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().expect("one message");
        assert_eq!(decoded.msgid, 7);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_buffer_yields_none() {
        let mut buf = BytesMut::from(&b"\x30"[..]);
        let mut codec = LdapCodec;
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
