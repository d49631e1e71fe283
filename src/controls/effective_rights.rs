use super::{MakeCritical, RawControl};

pub const GET_EFFECTIVE_RIGHTS_OID: &str = "1.3.6.1.4.1.42.2.27.9.5.2";

/// Get Effective Rights control (OpenLDAP/389-DS extension).
///
/// Asks the server to annotate each returned attribute with an
/// `aclRights`-style operational attribute describing what `authzid` (an
/// `"dn:..."` or `"u:..."`-prefixed identity) is permitted to do with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetEffectiveRights {
    pub authzid: String,
}

impl MakeCritical for GetEffectiveRights {}

impl From<GetEffectiveRights> for RawControl {
    fn from(ger: GetEffectiveRights) -> RawControl {
        RawControl {
            ctype: GET_EFFECTIVE_RIGHTS_OID.to_owned(),
            crit: false,
            val: Some(ger.authzid.into_bytes()),
        }
    }
}
