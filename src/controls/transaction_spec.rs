use super::{MakeCritical, RawControl};

pub const TRANSACTION_SPECIFICATION_OID: &str = "1.3.6.1.1.21.2";

/// Transaction Specification control ([RFC 5805](https://tools.ietf.org/html/rfc5805) §4).
///
/// Attached to every operation that should be folded into the transaction
/// identified by `transaction_id` (obtained from the Start-Transaction
/// extended operation). Unlike most controls the value is the raw
/// transaction identifier octet string, not a BER-wrapped sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSpecification {
    pub transaction_id: Vec<u8>,
}

impl MakeCritical for TransactionSpecification {}

impl From<TransactionSpecification> for RawControl {
    fn from(ts: TransactionSpecification) -> RawControl {
        RawControl {
            ctype: TRANSACTION_SPECIFICATION_OID.to_owned(),
            crit: true,
            val: Some(ts.transaction_id),
        }
    }
}
