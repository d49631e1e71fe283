use super::{Exop, ExopParser};
use crate::error::LdapError;

pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Who Am I extended operation ([RFC 4532](https://tools.ietf.org/html/rfc4532)).
///
/// Has no request payload; combine with [`crate::controls::ProxyAuth`] or
/// similar to ask who the server considers the connection authorized as
/// under that control's effect.
#[derive(Debug)]
pub struct WhoAmI;

/// Who Am I response: the `authzid` the server associates with this
/// connection, in the `dn:...` / `u:...` form of RFC 4513.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhoAmIResp {
    pub authzid: String,
}

impl From<WhoAmI> for Exop {
    fn from(_w: WhoAmI) -> Exop {
        Exop { name: Some(WHOAMI_OID.to_owned()), val: None }
    }
}

impl ExopParser for WhoAmIResp {
    fn parse(val: &[u8]) -> Result<WhoAmIResp, LdapError> {
        Ok(WhoAmIResp { authzid: String::from_utf8_lossy(val).into_owned() })
    }
}
