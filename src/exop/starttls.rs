use super::Exop;

pub const STARTTLS_OID: &str = "1.3.6.1.4.1.1466.20037";

/// StartTLS extended operation ([RFC 4511](https://tools.ietf.org/html/rfc4511#section-4.14)).
///
/// Not meant for direct use by callers; the connection engine sends it
/// when TLS is requested via `StartTls` rather than `ldaps://`.
pub struct StartTls;

impl From<StartTls> for Exop {
    fn from(_s: StartTls) -> Exop {
        Exop { name: Some(STARTTLS_OID.to_owned()), val: None }
    }
}
