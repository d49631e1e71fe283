//! Blocking facade over the async connection engine (§4.H).
//!
//! [`LdapConn`] owns a single-threaded Tokio runtime and blocks on every
//! call; its operation surface mirrors [`crate::conn::Ldap`] method for
//! method so the two stay at feature parity.

use tokio::runtime::{self, Runtime};

use crate::attrs::Attributes;
use crate::conn::{ConnState, Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope};
use crate::controls::{Control, SortKey};
use crate::dn::Dn;
use crate::error::LdapResult as LdapRes;
use crate::exop::{Exop, ExopParser};
use crate::result::{Entry, Page};

pub struct LdapConn {
    ldap: Ldap,
    rt: Runtime,
}

impl LdapConn {
    pub fn new(uri: &str) -> LdapRes<Self> {
        Self::with_settings(LdapConnSettings::default(), uri)
    }

    pub fn with_settings(settings: LdapConnSettings, uri: &str) -> LdapRes<Self> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(crate::error::LdapError::from)?;
        let ldap = rt.block_on(LdapConnAsync::with_settings(settings, uri))?;
        Ok(LdapConn { ldap, rt })
    }

    pub fn state(&self) -> ConnState {
        self.ldap.state()
    }

    pub fn reconnect(&self) -> LdapRes<()> {
        self.rt.block_on(self.ldap.reconnect())
    }

    pub fn set_controls(&self, controls: Vec<Control>) {
        self.ldap.set_controls(controls);
    }

    pub fn bind(&self, dn: &str, password: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.bind(dn, password, controls))
    }

    #[cfg(unix)]
    pub fn bind_external(&self, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.bind_external(controls))
    }

    pub fn bind_oauthbearer(&self, token: &str, authzid: Option<&str>, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.bind_oauthbearer(token, authzid, controls))
    }

    #[cfg(feature = "gssapi")]
    pub fn bind_gssapi(&self, host: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.bind_gssapi(host, controls))
    }

    pub fn whoami(&self) -> LdapRes<Option<String>> {
        self.rt.block_on(self.ldap.whoami())
    }

    pub fn unbind(&self) -> LdapRes<()> {
        self.rt.block_on(self.ldap.unbind())
    }

    pub fn start_tls(&self) -> LdapRes<()> {
        self.rt.block_on(self.ldap.start_tls())
    }

    pub fn add(&self, dn: &str, attrs: &Attributes, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.add(dn, attrs, controls))
    }

    pub fn delete(&self, dn: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.delete(dn, controls))
    }

    pub fn delete_recursive(&self, dn: &str) -> LdapRes<()> {
        self.rt.block_on(self.ldap.delete_recursive(dn))
    }

    pub fn modify(&self, dn: &str, old: &Attributes, new: &Attributes, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.modify(dn, old, new, controls))
    }

    pub fn modify_ml(&self, dn: &str, mods: Vec<Mod>, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.modify_ml(dn, mods, controls))
    }

    pub fn modrdn(&self, dn: &str, new_rdn: &str, delete_old: bool, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.modrdn(dn, new_rdn, delete_old, controls))
    }

    pub fn rename(&self, dn: &str, new_dn: &str, delete_old: bool, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.rename(dn, new_dn, delete_old, controls))
    }

    pub fn move_to(&self, dn: &str, new_parent: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        self.rt.block_on(self.ldap.move_to(dn, new_parent, controls))
    }

    pub fn compare<V: AsRef<[u8]>>(&self, dn: &str, attr: &str, value: V, controls: Vec<Control>) -> LdapRes<bool> {
        self.rt.block_on(self.ldap.compare(dn, attr, value, controls))
    }

    pub fn compare_dn(&self, existing: &str, other: &str) -> LdapRes<bool> {
        self.rt.block_on(self.ldap.compare_dn(existing, other))
    }

    pub fn search(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        unique: bool,
        controls: Vec<Control>,
    ) -> LdapRes<Vec<Entry>> {
        self.rt.block_on(self.ldap.search(base, scope, filter, attrs, unique, controls))
    }

    pub fn search_dn(&self, base: &str, scope: Scope, filter: &str, unique: bool, controls: Vec<Control>) -> LdapRes<Vec<Dn>> {
        self.rt.block_on(self.ldap.search_dn(base, scope, filter, unique, controls))
    }

    pub fn search_paged(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        page_size: i32,
        cookie: Vec<u8>,
    ) -> LdapRes<(Vec<Entry>, Vec<u8>, Page)> {
        self.rt.block_on(self.ldap.search_paged(base, scope, filter, attrs, page_size, cookie))
    }

    pub fn search_paginated(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        page_size: i32,
        sorting: Vec<SortKey>,
        offset: i32,
        content_count: i32,
    ) -> LdapRes<(Vec<Entry>, Page)> {
        self.rt.block_on(self.ldap.search_paginated(
            base,
            scope,
            filter,
            attrs,
            page_size,
            sorting,
            offset,
            content_count,
        ))
    }

    /// Lazy search iterator; only one in flight at a time per connection,
    /// since all traffic shares one socket. Restartable only once: after
    /// exhaustion or [`SearchIter::close`], further `next()` calls return
    /// `Ok(None)` rather than starting a new search.
    pub fn search_iter(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        controls: Vec<Control>,
    ) -> LdapRes<SearchIter<'_>> {
        let stream = self.rt.block_on(self.ldap.search_iter(base, scope, filter, attrs, controls))?;
        Ok(SearchIter { rt: &self.rt, stream: Some(stream) })
    }

    pub fn extended<E, R>(&self, exop: E, controls: Vec<Control>) -> LdapRes<(Entry, R)>
    where
        Exop: From<E>,
        R: ExopParser,
    {
        self.rt.block_on(self.ldap.extended(exop, controls))
    }

    pub fn cancel(&self, msgid: i32) -> LdapRes<crate::result::LdapOpResult> {
        self.rt.block_on(self.ldap.cancel(msgid))
    }

    pub fn abandon(&self, msgid: i32) -> LdapRes<()> {
        self.rt.block_on(self.ldap.abandon(msgid))
    }

    pub fn schema(&self) -> LdapRes<Attributes> {
        self.rt.block_on(self.ldap.schema())
    }

    /// Synchronous counterpart to [`crate::Ldap::with_transaction`]: `body`
    /// is ordinary blocking code issued through `self`, not an async
    /// closure — each step still blocks on its own, so there's no nested
    /// runtime. See §4.I for the commit/abort/restore semantics.
    pub fn with_transaction<F, T>(&self, set_controls: bool, body: F) -> LdapRes<T>
    where
        F: FnOnce(Vec<u8>) -> LdapRes<T>,
    {
        use crate::controls::TransactionSpecification;
        use crate::exop::{EndTransaction, StartTransaction, StartTransactionResp};

        let (_, started): (_, StartTransactionResp) =
            self.rt.block_on(self.ldap.extended(StartTransaction, Vec::new()))?;
        let transaction_id = started.transaction_id;
        let previous = self.ldap.default_controls();

        if set_controls {
            let mut controls = previous.clone();
            controls.push(TransactionSpecification { transaction_id: transaction_id.clone() }.into());
            self.ldap.set_controls(controls);
        }

        let result = body(transaction_id.clone());
        self.ldap.set_controls(previous);

        let end = if result.is_ok() {
            EndTransaction::commit(transaction_id)
        } else {
            EndTransaction::abort(Some(transaction_id))
        };
        self.rt.block_on(self.ldap.extended_raw(end.into(), Vec::new()))?;

        result
    }
}

/// Blocking wrapper over [`crate::conn::EntryStream`]. Once exhausted or
/// [`SearchIter::close`]d, further calls to `next()` return `Ok(None)`.
pub struct SearchIter<'a> {
    rt: &'a Runtime,
    stream: Option<crate::conn::EntryStream>,
}

impl SearchIter<'_> {
    pub fn next(&mut self) -> LdapRes<Option<Entry>> {
        match self.stream.as_mut() {
            Some(s) => self.rt.block_on(s.next()),
            None => Ok(None),
        }
    }

    pub fn close(&mut self) -> LdapRes<()> {
        if let Some(mut s) = self.stream.take() {
            self.rt.block_on(s.abandon())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_search_iter_stream_returns_none_without_polling_runtime() {
        let rt = runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let mut iter = SearchIter { rt: &rt, stream: None };
        assert_eq!(iter.next().unwrap(), None);
        assert!(iter.close().is_ok());
    }
}
