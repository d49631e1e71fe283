use super::{ControlParser, MakeCritical, RawControl};
use crate::error::LdapError;

pub const AUTHZ_IDENTITY_REQUEST_OID: &str = "2.16.840.1.113730.3.4.16";
pub const AUTHZ_IDENTITY_RESPONSE_OID: &str = "2.16.840.1.113730.3.4.15";

/// Authorization Identity request control ([RFC 3829](https://tools.ietf.org/html/rfc3829)).
///
/// Asks a Bind response to carry the authorization identity the server
/// assigned the connection, via [`AuthorizationIdentityResponse`].
pub struct AuthorizationIdentity;

impl MakeCritical for AuthorizationIdentity {}

impl From<AuthorizationIdentity> for RawControl {
    fn from(_a: AuthorizationIdentity) -> RawControl {
        RawControl { ctype: AUTHZ_IDENTITY_REQUEST_OID.to_owned(), crit: false, val: None }
    }
}

/// Authorization Identity response control: the `authzId` string assigned
/// to the bound connection, in the `dn:...` / `u:...` form of RFC 4513.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationIdentityResponse {
    pub authzid: String,
}

impl ControlParser for AuthorizationIdentityResponse {
    fn parse(val: &[u8]) -> Result<AuthorizationIdentityResponse, LdapError> {
        Ok(AuthorizationIdentityResponse { authzid: String::from_utf8_lossy(val).into_owned() })
    }
}
