use bytes::BytesMut;

use lber::common::TagClass;
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::write;

use super::Exop;

pub const END_TRANSACTION_OID: &str = "1.3.6.1.1.21.3";

/// Unsolicited notification a server may send to abort an in-progress
/// transaction on its own initiative ([RFC 5805](https://tools.ietf.org/html/rfc5805) §4).
pub const ABORTED_TRANSACTION_NOTICE_OID: &str = "1.3.6.1.1.21.4";

/// End Transaction extended operation ([RFC 5805](https://tools.ietf.org/html/rfc5805) §3).
///
/// `transaction_id` is the value returned by [`StartTransaction`](super::StartTransaction);
/// omitting it asks the server to abort whatever transaction the
/// connection currently holds open. `commit` chooses commit vs. abort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndTransaction {
    pub commit: bool,
    pub transaction_id: Option<Vec<u8>>,
}

impl EndTransaction {
    pub fn commit(transaction_id: Vec<u8>) -> EndTransaction {
        EndTransaction { commit: true, transaction_id: Some(transaction_id) }
    }

    pub fn abort(transaction_id: Option<Vec<u8>>) -> EndTransaction {
        EndTransaction { commit: false, transaction_id }
    }
}

impl From<EndTransaction> for Exop {
    fn from(e: EndTransaction) -> Exop {
        let mut inner = vec![Tag::Boolean(Boolean { inner: e.commit, ..Default::default() })];
        if let Some(id) = e.transaction_id {
            inner.push(Tag::OctetString(OctetString { inner: id, ..Default::default() }));
        }
        let val = Tag::Sequence(Sequence { inner, ..Default::default() }).into_structure();
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, val).expect("BER encoding of in-memory structure cannot fail");
        Exop { name: Some(END_TRANSACTION_OID.to_owned()), val: Some(Vec::from(&buf[..])) }
    }
}

// The success response carries no payload worth decoding (RFC 5805 §3
// defines only an optional updatesControls sequence used on partial
// failure, which the client learns about via the LDAPResult instead).

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_sets_flag_and_id() {
        let e = EndTransaction::commit(vec![1, 2, 3]);
        assert!(e.commit);
        assert_eq!(e.transaction_id, Some(vec![1, 2, 3]));
    }

    #[test]
    fn abort_without_id_clears_current_transaction() {
        let e = EndTransaction::abort(None);
        assert!(!e.commit);
        assert_eq!(e.transaction_id, None);
    }

    #[test]
    fn abort_without_id_omits_identifier_from_the_wire_value() {
        use lber::parse::parse_tag;
        use lber::IResult;

        let exop = Exop::from(EndTransaction::abort(None));
        let val = exop.val.expect("abort always has a request value");
        let tag = match parse_tag(&val) {
            IResult::Done(_, tag) => tag,
            _ => panic!("malformed BER value"),
        };
        let comps = tag.expect_constructed().expect("sequence");
        assert_eq!(comps.len(), 1, "identifier must be omitted, not sent as an empty octet string");
    }
}
