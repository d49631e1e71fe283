//! Transaction scope (§4.I, [RFC 5805](https://tools.ietf.org/html/rfc5805)).
//!
//! There's no async `Drop`, so the scope is a body-taking method rather
//! than a guard value: [`Ldap::with_transaction`] issues Start-Transaction,
//! runs `body`, then commits on `Ok` or aborts on `Err`, always restoring
//! whatever connection-wide controls were in effect before it started.

use std::future::Future;

use crate::conn::Ldap;
use crate::controls::TransactionSpecification;
use crate::error::LdapResult as LdapRes;
use crate::exop::{EndTransaction, StartTransaction, StartTransactionResp};

impl Ldap {
    /// Runs `body` inside a transaction, passing it the transaction id.
    ///
    /// With `set_controls = false` the connection-wide
    /// [`TransactionSpecification`] control is never attached, so `body`'s
    /// operations execute outside the transaction even though
    /// Start/End-Transaction still bracket them — used to verify the
    /// no-op path behaves identically to running `body` standalone.
    pub async fn with_transaction<F, Fut, T>(&self, set_controls: bool, body: F) -> LdapRes<T>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: Future<Output = LdapRes<T>>,
    {
        let (_, started): (_, StartTransactionResp) =
            self.extended(StartTransaction, Vec::new()).await?;
        let transaction_id = started.transaction_id;
        let previous = self.default_controls();

        if set_controls {
            let mut controls = previous.clone();
            controls.push(TransactionSpecification { transaction_id: transaction_id.clone() }.into());
            self.set_controls(controls);
        }

        let result = body(transaction_id.clone()).await;
        self.set_controls(previous);

        let end = if result.is_ok() {
            EndTransaction::commit(transaction_id)
        } else {
            EndTransaction::abort(Some(transaction_id))
        };
        self.extended_raw(end.into(), Vec::new()).await?;

        result
    }
}
