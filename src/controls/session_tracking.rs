use lber::structures::{ASNTag, OctetString, Sequence, Tag};

use super::{encode_tag, MakeCritical, RawControl};

pub const SESSION_TRACKING_OID: &str = "1.3.6.1.4.1.21008.108.63.1";

/// Session Tracking control ([RFC draft, OpenLDAP `sessiontrack`]).
///
/// Attaches client-supplied session identification (e.g. an end-user IP
/// and a correlation id) to a request, purely for server-side logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTracking {
    pub source_ip: String,
    pub source_name: String,
    pub format_oid: String,
    pub tracking_identifier: String,
}

impl MakeCritical for SessionTracking {}

impl From<SessionTracking> for RawControl {
    fn from(st: SessionTracking) -> RawControl {
        let cval = Tag::Sequence(Sequence {
            inner: vec![
                Tag::OctetString(OctetString { inner: st.source_ip.into_bytes(), ..Default::default() }),
                Tag::OctetString(OctetString { inner: st.source_name.into_bytes(), ..Default::default() }),
                Tag::OctetString(OctetString { inner: st.format_oid.into_bytes(), ..Default::default() }),
                Tag::OctetString(OctetString { inner: st.tracking_identifier.into_bytes(), ..Default::default() }),
            ],
            ..Default::default()
        })
        .into_structure();
        RawControl { ctype: SESSION_TRACKING_OID.to_owned(), crit: false, val: Some(encode_tag(cval)) }
    }
}
