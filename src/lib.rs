//! Pure-Rust LDAPv3 client core: connection engine, DN model, search
//! filter engine, controls and extended operations (RFC 4511 et al.).
//!
//! [`Ldap`](conn::Ldap) is the async entry point; [`sync::LdapConn`]
//! wraps it in a blocking facade over an internal Tokio runtime for
//! callers that don't want to deal with `async`/`.await` themselves.

pub mod attrs;
pub mod controls;
pub mod dn;
pub mod error;
pub mod exop;
pub mod filter;
mod protocol;
pub mod result;

mod conn;
#[cfg(feature = "sync")]
pub mod sync;
pub mod transaction;

pub use attrs::Attributes;
pub use conn::{
    CertRequirement, ConnState, DerefAliases, EntryStream, Ldap, LdapConnAsync, LdapConnSettings,
    Mod, Scope, TlsConfig,
};
pub use dn::Dn;
pub use error::{ErrorInfo, LdapError, LdapResult};
pub use filter::Filter;
pub use result::{Controls, Entry, LdapOpResult, Page, ResponseType};
#[cfg(feature = "sync")]
pub use sync::LdapConn;
