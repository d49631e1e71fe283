//! Error taxonomy.
//!
//! `LdapError` is a closed set of variants mapping LDAP result codes and
//! protocol conditions onto typed, value-like errors. Every variant carries
//! enough of the originating [`LdapResult`](crate::result::LdapOpResult) to
//! let a caller recover matched DN, diagnostic text and response controls
//! without re-parsing anything.

use std::io;

use crate::controls::Control;

/// Convenience alias used throughout the crate.
pub type LdapResult<T> = std::result::Result<T, LdapError>;

/// Common components of a failed LDAP operation, attached to most
/// [`LdapError`] variants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Additional diagnostic text returned by the server.
    pub description: String,
    /// Extra free-form information, if any (e.g. a referral URI).
    pub info: Option<String>,
    /// Matched component DN, where applicable.
    pub matched_dn: Option<String>,
    /// Raw numeric LDAP result code.
    pub result_code: u8,
    /// `errno`-style value for transport failures; absent for protocol
    /// and semantic errors.
    pub errno: Option<i32>,
    /// Response controls attached to the failing operation, if any.
    pub controls: Vec<Control>,
    /// Base DN the operation was rooted at, when known.
    pub base_dn: Option<String>,
}

impl ErrorInfo {
    pub fn new(result_code: u8, description: impl Into<String>) -> Self {
        ErrorInfo {
            description: description.into(),
            result_code,
            ..Default::default()
        }
    }

    pub fn with_matched_dn(mut self, dn: impl Into<String>) -> Self {
        self.matched_dn = Some(dn.into());
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }
}

/// The full taxonomy of errors this crate can produce.
///
/// Variants are grouped, in source order, the way §7 of the design groups
/// them: transport, semantic, protocol, then library-specific.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum LdapError {
    // --- transport ---
    #[error("server down: {0}")]
    ServerDown(ErrorInfo),
    #[error("operation timed out: {0}")]
    Timeout(ErrorInfo),
    #[error("TLS error: {0}")]
    TlsError(String),

    // --- semantic (RFC 4511 result codes) ---
    #[error("no such object: {0}")]
    NoSuchObject(ErrorInfo),
    #[error("entry already exists: {0}")]
    AlreadyExists(ErrorInfo),
    #[error("insufficient access rights: {0}")]
    InsufficientAccess(ErrorInfo),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(ErrorInfo),
    #[error("object class violation: {0}")]
    ObjectClassViolation(ErrorInfo),
    #[error("unavailable critical extension: {0}")]
    UnavailableCriticalExtension(ErrorInfo),
    #[error("assertion failed: {0}")]
    AssertionFailed(ErrorInfo),
    #[error("unwilling to perform: {0}")]
    UnwillingToPerform(ErrorInfo),
    #[error("not allowed on non-leaf entry: {0}")]
    AllowedOnNonleaf(ErrorInfo),

    // --- protocol ---
    #[error("protocol error: {0}")]
    ProtocolError(ErrorInfo),
    #[error("malformed search filter: {0}")]
    FilterError(String),
    #[error("malformed DN: {0}")]
    InvalidDN(String),
    #[error("virtual list view error: {0}")]
    VLVError(ErrorInfo),
    #[error("no such operation (msgid unknown or already completed): {0}")]
    NoSuchOperation(ErrorInfo),

    // --- library-specific ---
    #[error("unique search expected exactly one result, got {}", .results.len())]
    NotUnique { results: Vec<crate::result::Entry> },
    #[error("connection is not yet established")]
    Unconnected,
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),
    #[error("generic LDAP failure ({code}): {0}", code = .0.result_code)]
    Other(ErrorInfo),
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description, self.result_code)?;
        if let Some(ref dn) = self.matched_dn {
            write!(f, ", matched: {dn}")?;
        }
        if let Some(ref info) = self.info {
            write!(f, ", info: {info}")?;
        }
        Ok(())
    }
}

use std::fmt;

impl LdapError {
    /// Construct the correct variant from a raw LDAP result code and its
    /// associated diagnostic data, per RFC 4511 Appendix A.1.
    pub fn from_result_code(code: u8, info: ErrorInfo) -> LdapError {
        use LdapError::*;
        match code {
            32 => NoSuchObject(info),
            68 => AlreadyExists(info),
            50 => InsufficientAccess(info),
            49 => InvalidCredentials(info),
            65 => ObjectClassViolation(info),
            12 => UnavailableCriticalExtension(info),
            122 => AssertionFailed(info),
            53 => UnwillingToPerform(info),
            66 => AllowedOnNonleaf(info),
            2 => ProtocolError(info),
            34 => InvalidDN(info.description),
            52 | 81 => ServerDown(info),
            3 => Timeout(info),
            76 => VLVError(info),
            _ => Other(info),
        }
    }

    /// Whether retry discipline (§4.G) should attempt a reconnect and
    /// resend for this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, LdapError::ServerDown(_) | LdapError::Timeout(_))
    }

    /// The response controls carried by this error, if any.
    pub fn controls(&self) -> &[Control] {
        match self {
            LdapError::ServerDown(i)
            | LdapError::Timeout(i)
            | LdapError::NoSuchObject(i)
            | LdapError::AlreadyExists(i)
            | LdapError::InsufficientAccess(i)
            | LdapError::InvalidCredentials(i)
            | LdapError::ObjectClassViolation(i)
            | LdapError::UnavailableCriticalExtension(i)
            | LdapError::AssertionFailed(i)
            | LdapError::UnwillingToPerform(i)
            | LdapError::AllowedOnNonleaf(i)
            | LdapError::ProtocolError(i)
            | LdapError::VLVError(i)
            | LdapError::NoSuchOperation(i)
            | LdapError::Other(i) => &i.controls,
            _ => &[],
        }
    }
}

impl From<io::Error> for LdapError {
    fn from(e: io::Error) -> LdapError {
        LdapError::ServerDown(ErrorInfo::new(52, e.to_string()))
    }
}

impl From<url::ParseError> for LdapError {
    fn from(e: url::ParseError) -> LdapError {
        LdapError::Other(ErrorInfo::new(80, format!("invalid LDAP URL: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_well_known_result_codes() {
        let info = ErrorInfo::new(32, "no such object");
        assert_eq!(
            LdapError::from_result_code(32, info),
            LdapError::NoSuchObject(ErrorInfo::new(32, "no such object"))
        );
    }

    #[test]
    fn transient_classification() {
        assert!(LdapError::ServerDown(ErrorInfo::default()).is_transient());
        assert!(LdapError::Timeout(ErrorInfo::default()).is_transient());
        assert!(!LdapError::InvalidCredentials(ErrorInfo::default()).is_transient());
    }

    #[test]
    fn errors_are_clone_and_eq_stable() {
        let e1 = LdapError::InvalidDN("foo".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
