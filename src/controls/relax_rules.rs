use super::{MakeCritical, RawControl};

pub const RELAX_RULES_OID: &str = "1.3.6.1.4.1.4203.666.5.12";

/// Relax Rules control ([draft-zeilenga-ldap-relax](https://datatracker.ietf.org/doc/html/draft-zeilenga-ldap-relax)).
///
/// Asks the server to relax schema and related constraints it would
/// otherwise enforce (e.g. allowing a no-user-modification operational
/// attribute to be set directly). Request-only.
pub struct RelaxRules;

impl MakeCritical for RelaxRules {}

impl From<RelaxRules> for RawControl {
    fn from(_rr: RelaxRules) -> RawControl {
        RawControl { ctype: RELAX_RULES_OID.to_owned(), crit: false, val: None }
    }
}
