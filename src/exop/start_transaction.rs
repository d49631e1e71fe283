use lber::parse::parse_tag;
use lber::IResult;

use super::{Exop, ExopParser};
use crate::error::{ErrorInfo, LdapError};

pub const START_TRANSACTION_OID: &str = "1.3.6.1.1.21.1";

fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed start-transaction response: {what}")))
}

/// Start Transaction extended operation ([RFC 5805](https://tools.ietf.org/html/rfc5805) §3).
///
/// The response value is the transaction identifier to pass to every
/// operation in the transaction via [`crate::controls::TransactionSpecification`]
/// and, finally, to [`EndTransaction`](super::EndTransaction).
#[derive(Debug)]
pub struct StartTransaction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartTransactionResp {
    pub transaction_id: Vec<u8>,
}

impl From<StartTransaction> for Exop {
    fn from(_s: StartTransaction) -> Exop {
        Exop { name: Some(START_TRANSACTION_OID.to_owned()), val: None }
    }
}

impl ExopParser for StartTransactionResp {
    fn parse(val: &[u8]) -> Result<StartTransactionResp, LdapError> {
        if val.is_empty() {
            return Ok(StartTransactionResp { transaction_id: Vec::new() });
        }
        let tag = match parse_tag(val) {
            IResult::Done(_, tag) => tag,
            _ => return Err(protocol_error("BER value")),
        };
        let transaction_id = tag.expect_primitive().ok_or_else(|| protocol_error("transactionID"))?;
        Ok(StartTransactionResp { transaction_id })
    }
}
