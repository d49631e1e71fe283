//! Async connection & operation engine (§4.G).
//!
//! A connection is a single TCP (or Unix-domain, or TLS-wrapped) stream
//! framed by [`crate::protocol::LdapCodec`]. Outgoing requests are
//! serialized through a mutex-guarded sink (§5 "Ordering guarantees");
//! a background task owns the read half and demultiplexes responses by
//! message id to whichever caller is awaiting them, via a one-shot
//! channel for single-response operations or an unbounded channel for
//! search streams.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::StreamExt;
use futures::SinkExt;
use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Boolean, Integer, Null, OctetString, Sequence, Set, Tag};
use lber::universal::Types;
use lber::IResult;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use url::Url;

use crate::attrs::Attributes;
use crate::controls::{Control, PagedResults, ServerSideSorting, SortKey, Vlv, VlvResponse, VlvTarget};
use crate::dn::Dn;
use crate::error::{ErrorInfo, LdapError};
use crate::exop::{construct_exop, parse_exop, Exop, ExopParser, StartTls};
use crate::filter::Filter;
use crate::protocol::{LdapCodec, ProtoOp, Request};
use crate::result::{Controls, Entry, LdapOpResult, Page, ResponseType};

fn protocol_error(what: &str) -> LdapError {
    LdapError::ProtocolError(ErrorInfo::new(2, format!("malformed response: {what}")))
}

type LdapRes<T> = Result<T, LdapError>;

/// Scope of a Search operation (RFC 4511 §4.5.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Base = 0,
    OneLevel = 1,
    Subtree = 2,
}

/// `derefAliases` choice of a Search request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerefAliases {
    Never = 0,
    InSearch = 1,
    FindingBaseObject = 2,
    Always = 3,
}

/// One Modify operation's change, in the shape of RFC 4511 §4.6's
/// `change SEQUENCE { operation ENUMERATED, modification PartialAttribute }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mod {
    Add(String, Vec<Vec<u8>>),
    Delete(String, Vec<Vec<u8>>),
    Replace(String, Vec<Vec<u8>>),
}

/// How strictly the TLS peer certificate is verified (§9 "Global TLS state").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CertRequirement {
    Never,
    #[default]
    Optional,
    Always,
}

/// Process-wide TLS parameters, applied via [`Ldap::set_tls`] the way the
/// underlying C library's global context is configured in the original.
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    pub client_cert: Option<(PathBuf, PathBuf)>,
    pub require_cert: CertRequirement,
}

lazy_static::lazy_static! {
    static ref TLS_CONFIG: Mutex<TlsConfig> = Mutex::new(TlsConfig::default());
}

/// Construction parameters for a connection (§4.G).
#[derive(Clone, Debug)]
pub struct LdapConnSettings {
    start_tls: bool,
    conn_timeout: Option<Duration>,
    retry_delay: Duration,
    max_connection_attempts: u32,
    automatic_reconnect: bool,
}

impl Default for LdapConnSettings {
    fn default() -> Self {
        LdapConnSettings {
            start_tls: false,
            conn_timeout: None,
            retry_delay: Duration::from_secs(1),
            max_connection_attempts: 1,
            automatic_reconnect: true,
        }
    }
}

impl LdapConnSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_tls(mut self, yes: bool) -> Self {
        self.start_tls = yes;
        self
    }

    pub fn conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = Some(timeout);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_connection_attempts(mut self, n: u32) -> Self {
        self.max_connection_attempts = n.max(1);
        self
    }

    pub fn automatic_reconnect(mut self, yes: bool) -> Self {
        self.automatic_reconnect = yes;
        self
    }
}

/// Lifecycle of a connection (§4.G).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Unconnected,
    Connected,
    Bound,
    Unbound,
    Disconnected,
}

trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

type BoxedStream = Box<dyn AsyncStream>;
type FramedSink = futures::stream::SplitSink<Framed<BoxedStream, LdapCodec>, Request>;
type FramedSource = futures::stream::SplitStream<Framed<BoxedStream, LdapCodec>>;

enum Pending {
    Single(oneshot::Sender<ProtoOp>),
    Multi(mpsc::UnboundedSender<ProtoOp>),
}

/// The last successful bind, cached so [`Ldap::reconnect`] can restore the
/// identity on the new transport. SASL mechanisms aren't replayable (their
/// credentials are one-shot or host-bound), so reconnecting after one of
/// those just drops back to an anonymous connection.
enum BindCreds {
    Simple { dn: String, password: String },
    NotReplayable,
}

struct Shared {
    uri: String,
    settings: LdapConnSettings,
    sink: tokio::sync::Mutex<Option<FramedSink>>,
    next_msgid: AtomicI32,
    pending: Mutex<HashMap<i32, Pending>>,
    state: Mutex<ConnState>,
    bound_dn: Mutex<Option<String>>,
    last_bind: Mutex<Option<BindCreds>>,
    /// 1-indexed page number for the next `search_paged` call; reset to 1
    /// whenever that call starts a fresh cursor (empty incoming cookie).
    paged_search_page: AtomicU32,
    default_controls: Mutex<Controls>,
    schema: Mutex<Option<Attributes>>,
}

/// Handle for LDAP operations over a single connection. Cheaply `Clone`able:
/// clones share the same underlying socket and pending-request table.
#[derive(Clone)]
pub struct Ldap {
    shared: Arc<Shared>,
}

/// Namespace for asynchronously establishing a connection; kept as a
/// distinct type, rather than an inherent `Ldap::connect`, so construction
/// reads the same way at call sites regardless of which facade
/// ([`Ldap`] or [`crate::sync::LdapConn`]) ultimately wraps it.
pub struct LdapConnAsync;

impl LdapConnAsync {
    pub async fn new(uri: &str) -> LdapRes<Ldap> {
        Self::with_settings(LdapConnSettings::default(), uri).await
    }

    pub async fn with_settings(settings: LdapConnSettings, uri: &str) -> LdapRes<Ldap> {
        Ldap::connect(uri, settings).await
    }
}

impl Ldap {
    /// Sets the process-wide TLS parameters used by every subsequent
    /// `ldaps://` or StartTLS connection (§5 "Shared resources").
    pub fn set_tls(cfg: TlsConfig) {
        *TLS_CONFIG.lock().expect("TLS config mutex poisoned") = cfg;
    }

    async fn connect(uri: &str, settings: LdapConnSettings) -> LdapRes<Ldap> {
        let stream = open_transport(uri, &settings).await?;
        let shared = Arc::new(Shared {
            uri: uri.to_owned(),
            settings,
            sink: tokio::sync::Mutex::new(None),
            next_msgid: AtomicI32::new(1),
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(ConnState::Unconnected),
            bound_dn: Mutex::new(None),
            last_bind: Mutex::new(None),
            paged_search_page: AtomicU32::new(0),
            default_controls: Mutex::new(Controls::new()),
            schema: Mutex::new(None),
        });
        Self::attach(&shared, stream).await?;
        let ldap = Ldap { shared };
        if ldap.shared.settings.start_tls {
            ldap.start_tls().await?;
        }
        *ldap.shared.state.lock().expect("state mutex poisoned") = ConnState::Connected;
        Ok(ldap)
    }

    async fn attach(shared: &Arc<Shared>, stream: BoxedStream) -> LdapRes<()> {
        let framed = Framed::new(stream, LdapCodec);
        let (sink, mut source) = framed.split();
        *shared.sink.lock().await = Some(sink);
        let reader_shared = Arc::clone(shared);
        tokio::spawn(async move {
            while let Some(item) = source.next().await {
                match item {
                    Ok(op) => dispatch(&reader_shared, op),
                    Err(e) => {
                        warn!("connection read error: {e}");
                        break;
                    }
                }
            }
            fail_all_pending(&reader_shared);
            *reader_shared.state.lock().expect("state mutex poisoned") = ConnState::Disconnected;
        });
        Ok(())
    }

    /// Current position in the `Unconnected → Connected → Bound →
    /// Unbound → Disconnected` lifecycle (§4.G).
    pub fn state(&self) -> ConnState {
        *self.shared.state.lock().expect("state mutex poisoned")
    }

    /// Re-establishes the connection, preserving URI and TLS/StartTLS
    /// choice, dropping the schema cache, and replaying the last
    /// successful Simple Bind if there was one (§4.G).
    pub async fn reconnect(&self) -> LdapRes<()> {
        debug!("reconnecting to {}", self.shared.uri);
        let stream = open_transport(&self.shared.uri, &self.shared.settings).await?;
        fail_all_pending(&self.shared);
        Self::attach(&self.shared, stream).await?;
        if self.shared.settings.start_tls {
            self.start_tls().await?;
        }
        *self.shared.schema.lock().expect("schema mutex poisoned") = None;
        *self.shared.state.lock().expect("state mutex poisoned") = ConnState::Connected;
        *self.shared.bound_dn.lock().expect("bound_dn mutex poisoned") = None;

        let creds = self.shared.last_bind.lock().expect("last_bind mutex poisoned").take();
        match creds {
            Some(BindCreds::Simple { dn, password }) => {
                self.bind(&dn, &password, Vec::new()).await?;
            }
            Some(BindCreds::NotReplayable) => {
                warn!("reconnect: previous bind used a non-replayable mechanism, connection is now anonymous");
            }
            None => {}
        }
        Ok(())
    }

    fn require_connected(&self) -> LdapRes<()> {
        if *self.shared.state.lock().expect("state mutex poisoned") == ConnState::Unconnected {
            return Err(LdapError::Unconnected);
        }
        Ok(())
    }

    fn next_msgid(&self) -> i32 {
        self.shared.next_msgid.fetch_add(1, Ordering::SeqCst)
    }

    /// Merges connection-wide default server controls with per-operation
    /// `extra` controls and encodes them for the wire, per §4.E
    /// ("server/client lists concatenated").
    fn merged_controls(&self, extra: Vec<Control>) -> Option<StructureTag> {
        let defaults = self.shared.default_controls.lock().expect("controls mutex poisoned");
        let mut all = defaults.server.clone();
        all.extend(defaults.client.clone());
        all.extend(extra);
        if all.is_empty() {
            None
        } else {
            Some(crate::controls::encode_controls(all))
        }
    }

    /// Sets the connection-wide default server controls, replacing any
    /// previously configured ones (§5 "Shared resources").
    pub fn set_controls(&self, controls: Vec<Control>) {
        self.shared.default_controls.lock().expect("controls mutex poisoned").server = controls;
    }

    fn take_request_controls(&self) -> Controls {
        self.shared.default_controls.lock().expect("controls mutex poisoned").clone()
    }

    /// Current connection-wide default server controls (§4.I: the
    /// transaction scope snapshots and restores these around its body).
    pub(crate) fn default_controls(&self) -> Vec<Control> {
        self.shared.default_controls.lock().expect("controls mutex poisoned").server.clone()
    }

    /// Sends one request and awaits its single reply, retrying on
    /// transient failure per §4.G's retry discipline.
    async fn submit(&self, mk: impl Fn() -> Tag, extra: Vec<Control>) -> LdapRes<LdapOpResult> {
        self.require_connected()?;
        let mut attempt = 0u32;
        loop {
            match self.submit_once(mk(), extra.clone()).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt + 1 < self.shared.settings.max_connection_attempts => {
                    attempt += 1;
                    debug!("transient error, retrying ({attempt}/{}): {e}", self.shared.settings.max_connection_attempts);
                    tokio::time::sleep(self.shared.settings.retry_delay).await;
                    if self.shared.settings.automatic_reconnect {
                        self.reconnect().await?;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn submit_once(&self, op: Tag, extra: Vec<Control>) -> LdapRes<LdapOpResult> {
        let msgid = self.next_msgid();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().expect("pending mutex poisoned").insert(msgid, Pending::Single(tx));
        let controls = self.merged_controls(extra);
        self.send(Request { msgid, op, controls }).await?;
        let proto_op = rx.await.map_err(|_| {
            LdapError::ServerDown(ErrorInfo::new(52, "connection closed while awaiting response"))
        })?;
        decode_ldap_result(proto_op.op, proto_op.controls)
    }

    async fn submit_multi(&self, op: Tag, extra: Vec<Control>) -> LdapRes<(i32, mpsc::UnboundedReceiver<ProtoOp>)> {
        self.require_connected()?;
        let msgid = self.next_msgid();
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.pending.lock().expect("pending mutex poisoned").insert(msgid, Pending::Multi(tx));
        let controls = self.merged_controls(extra);
        self.send(Request { msgid, op, controls }).await?;
        Ok((msgid, rx))
    }

    async fn send(&self, req: Request) -> LdapRes<()> {
        let mut guard = self.shared.sink.lock().await;
        let sink = guard.as_mut().ok_or(LdapError::Unconnected)?;
        // Held across the await: this is precisely the serialization point
        // described in §5 ("callers serialize on the internal lock").
        sink.send(req).await
    }

    /// Sends an Abandon request (RFC 4511 §4.11) for `msgid`; the server
    /// sends no response.
    pub async fn abandon(&self, msgid: i32) -> LdapRes<()> {
        self.require_connected()?;
        let id = self.next_msgid();
        let op = Tag::Integer(Integer { id: 16, class: TagClass::Application, inner: msgid as i64 });
        self.send(Request { msgid: id, op, controls: None }).await
    }

    /// Sends the Cancel extended operation (RFC 3909) for `msgid`.
    pub async fn cancel(&self, msgid: i32) -> LdapRes<LdapOpResult> {
        let val = Tag::Sequence(Sequence {
            inner: vec![Tag::Integer(Integer { inner: msgid as i64, ..Default::default() })],
            ..Default::default()
        })
        .into_structure();
        let exop = Exop { name: Some("1.3.6.1.1.8".to_owned()), val: Some(crate::controls::encode_tag(val)) };
        let res = self.extended_raw(exop, Vec::new()).await?;
        if res.result_code == 118 {
            return Err(LdapError::NoSuchOperation(ErrorInfo::new(118, res.diagnostic_message)));
        }
        Ok(res)
    }

    // --- Bind ---

    /// Simple Bind (RFC 4511 §4.2). `InvalidCredentials` is never retried,
    /// but `ServerDown`/`Timeout` get the same retry discipline as every
    /// other operation (§4.G).
    pub async fn bind(&self, dn: &str, password: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let dn_bytes = dn.as_bytes().to_vec();
        let password_bytes = password.as_bytes().to_vec();
        let raw = self
            .submit(
                || {
                    app_tag(
                        0,
                        vec![
                            Tag::Integer(Integer { inner: 3, ..Default::default() }),
                            Tag::OctetString(OctetString { inner: dn_bytes.clone(), ..Default::default() }),
                            Tag::OctetString(OctetString { id: 0, class: TagClass::Context, inner: password_bytes.clone() }),
                        ],
                    )
                },
                controls,
            )
            .await?;
        if raw.result_code != 0 {
            return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
        }
        *self.shared.bound_dn.lock().expect("bound_dn mutex poisoned") = Some(dn.to_owned());
        *self.shared.state.lock().expect("state mutex poisoned") = ConnState::Bound;
        *self.shared.last_bind.lock().expect("last_bind mutex poisoned") =
            Some(BindCreds::Simple { dn: dn.to_owned(), password: password.to_owned() });
        Ok(Entry::from_response(Some(Dn::parse(dn)?), None, &req_controls, &raw))
    }

    /// SASL EXTERNAL bind (Unix-domain-socket connections only), with the
    /// empty authzId, per §4.G.
    #[cfg(unix)]
    pub async fn bind_external(&self, controls: Vec<Control>) -> LdapRes<Entry> {
        self.sasl_bind("EXTERNAL", Vec::new(), controls).await
    }

    /// SASL OAUTHBEARER bind ([RFC 7628](https://tools.ietf.org/html/rfc7628)).
    pub async fn bind_oauthbearer(&self, token: &str, authzid: Option<&str>, controls: Vec<Control>) -> LdapRes<Entry> {
        let authzid = authzid.unwrap_or("");
        let creds = format!("n,a={authzid},\x01auth=Bearer {token}\x01\x01");
        self.sasl_bind("OAUTHBEARER", creds.into_bytes(), controls).await
    }

    /// SASL GSSAPI bind ([RFC 4752](https://tools.ietf.org/html/rfc4752)),
    /// available when built with the `gssapi` feature.
    #[cfg(feature = "gssapi")]
    pub async fn bind_gssapi(&self, host: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        use cross_krb5::{ClientCtx, InitiateFlags, Step};
        let spn = format!("ldap/{host}");
        let (mut pending, token) = ClientCtx::new(InitiateFlags::empty(), None, &spn, None)
            .map_err(|e| LdapError::Other(ErrorInfo::new(80, format!("GSSAPI context init: {e}"))))?;
        let mut creds = Vec::from(&token[..]);
        loop {
            let entry = self.sasl_bind("GSSAPI", creds, controls.clone()).await?;
            let server_creds = entry.extended_value.clone().unwrap_or_default();
            match pending
                .step(&server_creds)
                .map_err(|e| LdapError::Other(ErrorInfo::new(80, format!("GSSAPI step: {e}"))))?
            {
                Step::Finished(_) => return Ok(entry),
                Step::Continue((next_pending, next_token)) => {
                    pending = next_pending;
                    creds = Vec::from(&next_token[..]);
                }
            }
        }
    }

    async fn sasl_bind(&self, mechanism: &str, credentials: Vec<u8>, controls: Vec<Control>) -> LdapRes<Entry> {
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let sasl = Tag::Sequence(Sequence {
            id: 3,
            class: TagClass::Context,
            inner: vec![
                Tag::OctetString(OctetString { inner: mechanism.as_bytes().to_vec(), ..Default::default() }),
                Tag::OctetString(OctetString { inner: credentials, ..Default::default() }),
            ],
        });
        let op = app_tag(
            0,
            vec![
                Tag::Integer(Integer { inner: 3, ..Default::default() }),
                Tag::OctetString(OctetString { inner: Vec::new(), ..Default::default() }),
                sasl,
            ],
        );
        let raw = self.submit_once(op, controls).await?;
        if raw.result_code != 0 && raw.result_code != 14 {
            // 14 == saslBindInProgress, a legitimate intermediate step
            return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
        }
        if raw.result_code == 0 {
            *self.shared.state.lock().expect("state mutex poisoned") = ConnState::Bound;
            *self.shared.bound_dn.lock().expect("bound_dn mutex poisoned") = Some(format!("<sasl:{mechanism}>"));
            *self.shared.last_bind.lock().expect("last_bind mutex poisoned") = Some(BindCreds::NotReplayable);
        }
        Ok(Entry::from_response(None, None, &req_controls, &raw))
    }

    /// Uses the WhoAmI extended operation (RFC 4532) to fetch the bound
    /// identity; `None` if unbound.
    pub async fn whoami(&self) -> LdapRes<Option<String>> {
        if self.shared.bound_dn.lock().expect("bound_dn mutex poisoned").is_none() {
            return Ok(None);
        }
        let exop = Exop::from(crate::exop::WhoAmI);
        let raw = self.extended_raw(exop, Vec::new()).await?;
        if raw.result_code != 0 {
            return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
        }
        match raw.value {
            Some(v) => Ok(Some(parse_exop::<crate::exop::WhoAmIResp>(&v)?.authzid)),
            None => Ok(None),
        }
    }

    /// Unbinds (RFC 4511 §4.3); idempotent, never fails the connection.
    pub async fn unbind(&self) -> LdapRes<()> {
        if *self.shared.state.lock().expect("state mutex poisoned") == ConnState::Unbound {
            return Ok(());
        }
        let id = self.next_msgid();
        let op = Tag::Null(Null { id: 2, class: TagClass::Application, inner: () });
        let _ = self.send(Request { msgid: id, op, controls: None }).await;
        *self.shared.state.lock().expect("state mutex poisoned") = ConnState::Unbound;
        *self.shared.bound_dn.lock().expect("bound_dn mutex poisoned") = None;
        *self.shared.last_bind.lock().expect("last_bind mutex poisoned") = None;
        Ok(())
    }

    /// Upgrades a cleartext connection to TLS in band (RFC 4511 §4.14).
    pub async fn start_tls(&self) -> LdapRes<()> {
        let exop = Exop::from(StartTls);
        let raw = self.extended_raw(exop, Vec::new()).await?;
        if raw.result_code != 0 {
            return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
        }
        // Actual TLS handshake over the now-negotiated plaintext socket is
        // performed by `open_transport`/`reconnect`, since those are the
        // only places that own the raw stream before it's framed.
        Ok(())
    }

    // --- Add / Delete / Modify / ModDN / Compare ---

    pub async fn add(&self, dn: &str, attrs: &Attributes, controls: Vec<Control>) -> LdapRes<Entry> {
        let req_controls = self.take_request_controls();
        let op = app_tag(
            8,
            vec![
                Tag::OctetString(OctetString { inner: dn.as_bytes().to_vec(), ..Default::default() }),
                attribute_list_tag(attrs),
            ],
        );
        let raw = self.submit(|| op.clone(), controls).await?;
        finish(Some(Dn::parse(dn)?), None, &req_controls, raw)
    }

    pub async fn delete(&self, dn: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        let req_controls = self.take_request_controls();
        let op = Tag::OctetString(OctetString { id: 10, class: TagClass::Application, inner: dn.as_bytes().to_vec() });
        let raw = self.submit(|| op.clone(), controls).await?;
        finish(Some(Dn::parse(dn)?), None, &req_controls, raw)
    }

    /// Removes `dn`'s subtree bottom-up, tolerating a concurrently deleted
    /// child by treating `NoSuchObject` from `delete` as success.
    pub async fn delete_recursive(&self, dn: &str) -> LdapRes<()> {
        let base = Dn::parse(dn)?;
        let children = self.search_dn(dn, Scope::OneLevel, "(objectClass=*)", false, Vec::new()).await?;
        for child in children {
            Box::pin(self.delete_recursive(&child.to_string())).await?;
        }
        match self.delete(&base.to_string(), Vec::new()).await {
            Ok(_) => Ok(()),
            Err(LdapError::NoSuchObject(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_ml(&self, dn: &str, mods: Vec<Mod>, controls: Vec<Control>) -> LdapRes<Entry> {
        let req_controls = self.take_request_controls();
        let changes = mods.into_iter().map(mod_to_tag).collect();
        let op = app_tag(
            6,
            vec![
                Tag::OctetString(OctetString { inner: dn.as_bytes().to_vec(), ..Default::default() }),
                Tag::Sequence(Sequence { inner: changes, ..Default::default() }),
            ],
        );
        let raw = self.submit(|| op.clone(), controls).await?;
        finish(Some(Dn::parse(dn)?), None, &req_controls, raw)
    }

    /// Computes the differential modlist between `old` and `new` and
    /// applies it: keys only in `new` (or with different values) are
    /// replaced, keys only in `old` are deleted.
    pub async fn modify(&self, dn: &str, old: &Attributes, new: &Attributes, controls: Vec<Control>) -> LdapRes<Entry> {
        let mut mods = Vec::new();
        for (name, values) in new.iter() {
            if old.get(name).map(|v| v == values.as_slice()).unwrap_or(false) {
                continue;
            }
            mods.push(Mod::Replace(name.to_owned(), values.to_vec()));
        }
        for (name, _) in old.iter() {
            if new.get(name).is_none() {
                mods.push(Mod::Delete(name.to_owned(), Vec::new()));
            }
        }
        self.modify_ml(dn, mods, controls).await
    }

    async fn moddn(&self, dn: &str, new_rdn: &str, delete_old: bool, new_superior: Option<&str>, controls: Vec<Control>) -> LdapRes<Entry> {
        let req_controls = self.take_request_controls();
        let mut inner = vec![
            Tag::OctetString(OctetString { inner: dn.as_bytes().to_vec(), ..Default::default() }),
            Tag::OctetString(OctetString { inner: new_rdn.as_bytes().to_vec(), ..Default::default() }),
            Tag::Boolean(Boolean { inner: delete_old, ..Default::default() }),
        ];
        if let Some(sup) = new_superior {
            inner.push(Tag::OctetString(OctetString { id: 0, class: TagClass::Context, inner: sup.as_bytes().to_vec() }));
        }
        let op = app_tag(12, inner);
        let raw = self.submit(|| op.clone(), controls).await?;
        let new_dn = match new_superior {
            Some(sup) => format!("{new_rdn},{sup}"),
            None => {
                let parent = Dn::parse(dn)?.parent();
                match parent {
                    Some(p) => format!("{new_rdn},{p}"),
                    None => new_rdn.to_owned(),
                }
            }
        };
        finish(Some(Dn::parse(&new_dn)?), None, &req_controls, raw)
    }

    pub async fn modrdn(&self, dn: &str, new_rdn: &str, delete_old: bool, controls: Vec<Control>) -> LdapRes<Entry> {
        self.moddn(dn, new_rdn, delete_old, None, controls).await
    }

    pub async fn rename(&self, dn: &str, new_dn: &str, delete_old: bool, controls: Vec<Control>) -> LdapRes<Entry> {
        let target = Dn::parse(new_dn)?;
        let rdn_str = target.nth(0).to_string();
        let superior = target.parent().map(|p| p.to_string());
        self.moddn(dn, &rdn_str, delete_old, superior.as_deref(), controls).await
    }

    pub async fn move_to(&self, dn: &str, new_parent: &str, controls: Vec<Control>) -> LdapRes<Entry> {
        let rdn_str = Dn::parse(dn)?.nth(0).to_string();
        self.moddn(dn, &rdn_str, false, Some(new_parent), controls).await
    }

    pub async fn compare<V: AsRef<[u8]>>(&self, dn: &str, attr: &str, value: V, controls: Vec<Control>) -> LdapRes<bool> {
        let op = app_tag(
            14,
            vec![
                Tag::OctetString(OctetString { inner: dn.as_bytes().to_vec(), ..Default::default() }),
                Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString { inner: attr.as_bytes().to_vec(), ..Default::default() }),
                        Tag::OctetString(OctetString { inner: value.as_ref().to_vec(), ..Default::default() }),
                    ],
                    ..Default::default()
                }),
            ],
        );
        let raw = self.submit(|| op.clone(), controls).await?;
        match raw.result_code {
            5 => Ok(true),
            6 => Ok(false),
            code => Err(LdapError::from_result_code(code, error_info(&raw))),
        }
    }

    /// DN comparison à la the original `compare_dn`: issues a Compare for
    /// every AVA of `other` against `existing`'s entry. `("", "")` is
    /// true by definition (§9 Open Questions).
    pub async fn compare_dn(&self, existing: &str, other: &str) -> LdapRes<bool> {
        let existing_dn = Dn::parse(existing)?;
        let other_dn = Dn::parse(other)?;
        if existing_dn.is_empty() && other_dn.is_empty() {
            return Ok(true);
        }
        for (attr, value) in other_dn.multi_rdn() {
            if !self.compare(existing, attr, value.as_bytes(), Vec::new()).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // --- Search ---

    fn search_request(base: &str, scope: Scope, filter: &str, attrs: &[&str], typesonly: bool) -> LdapRes<Tag> {
        let filter = Filter::parse(filter)?;
        Ok(app_tag(
            3,
            vec![
                Tag::OctetString(OctetString { inner: base.as_bytes().to_vec(), ..Default::default() }),
                Tag::Integer(Integer { inner: scope as i64, ..Default::default() }),
                Tag::Integer(Integer { inner: DerefAliases::Never as i64, ..Default::default() }),
                Tag::Integer(Integer { inner: 0, ..Default::default() }),
                Tag::Integer(Integer { inner: 0, ..Default::default() }),
                Tag::Boolean(Boolean { inner: typesonly, ..Default::default() }),
                Tag::StructureTag(filter.to_tag()),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .iter()
                        .map(|a| Tag::OctetString(OctetString { inner: a.as_bytes().to_vec(), ..Default::default() }))
                        .collect(),
                    ..Default::default()
                }),
            ],
        ))
    }

    /// Buffered search: collects every entry before returning.
    pub async fn search(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        unique: bool,
        controls: Vec<Control>,
    ) -> LdapRes<Vec<Entry>> {
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let op = Self::search_request(base, scope, filter, &attrs, false)?;
        let (_msgid, mut rx) = self.submit_multi(op, controls).await?;
        let mut entries = Vec::new();
        loop {
            let proto_op = rx.recv().await.ok_or_else(|| {
                LdapError::ServerDown(ErrorInfo::new(52, "connection closed during search"))
            })?;
            match proto_op.op.id {
                4 => {
                    let (dn, attrs) = decode_search_entry(proto_op.op)?;
                    entries.push(Entry::from_response(Some(dn), Some(attrs), &req_controls, &LdapOpResult::default()));
                    if unique && entries.len() > 1 {
                        return Err(LdapError::NotUnique { results: entries });
                    }
                }
                19 => continue, // search result reference: not followed
                5 => {
                    let raw = decode_ldap_result(proto_op.op, proto_op.controls)?;
                    if raw.result_code != 0 {
                        return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
                    }
                    return Ok(entries);
                }
                other => return Err(protocol_error(&format!("unexpected search response tag {other}"))),
            }
        }
    }

    /// Lazy, non-restartable stream of entries; dropping it abandons the
    /// underlying message.
    pub async fn search_iter(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        controls: Vec<Control>,
    ) -> LdapRes<EntryStream> {
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let op = Self::search_request(base, scope, filter, &attrs, false)?;
        let (msgid, rx) = self.submit_multi(op, controls).await?;
        Ok(EntryStream { ldap: self.clone(), msgid, rx: Some(rx), req_controls, done: false })
    }

    pub async fn search_dn(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        unique: bool,
        controls: Vec<Control>,
    ) -> LdapRes<Vec<Dn>> {
        let entries = self.search(base, scope, filter, Vec::new(), unique, controls).await?;
        entries.into_iter().filter_map(|e| e.dn).map(Ok).collect()
    }

    /// Simple Paged Results (RFC 2696): drives pagination with a server
    /// cookie, one page per call. Returns `(entries, cookie)`; an empty
    /// cookie signals the final page.
    pub async fn search_paged(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        page_size: i32,
        cookie: Vec<u8>,
    ) -> LdapRes<(Vec<Entry>, Vec<u8>, Page)> {
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let op = Self::search_request(base, scope, filter, &attrs, false)?;
        let page_num = if cookie.is_empty() {
            self.shared.paged_search_page.store(1, Ordering::SeqCst);
            1
        } else {
            self.shared.paged_search_page.fetch_add(1, Ordering::SeqCst) + 1
        };
        let pr = PagedResults { size: page_size, cookie };
        let (_msgid, mut rx) = self.submit_multi(op, vec![pr.into()]).await?;
        let mut entries = Vec::new();
        loop {
            let proto_op = rx.recv().await.ok_or_else(|| {
                LdapError::ServerDown(ErrorInfo::new(52, "connection closed during search"))
            })?;
            match proto_op.op.id {
                4 => {
                    let (dn, attrs) = decode_search_entry(proto_op.op)?;
                    entries.push(Entry::from_response(Some(dn), Some(attrs), &req_controls, &LdapOpResult::default()));
                }
                19 => continue,
                5 => {
                    let raw = decode_ldap_result(proto_op.op, proto_op.controls)?;
                    if raw.result_code != 0 {
                        return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
                    }
                    let next_cookie = raw
                        .controls
                        .iter()
                        .find(|c| c.ctype == crate::controls::PAGED_RESULTS_OID)
                        .and_then(|c| c.val.clone())
                        .and_then(|v| PagedResults::parse(&v).ok())
                        .map(|pr| pr.cookie)
                        .unwrap_or_default();
                    let count = entries.len();
                    let entries: Vec<Entry> = entries
                        .into_iter()
                        .enumerate()
                        .map(|(i, e)| e.with_page(Page::new(page_num, i as u32 + 1, page_size as u32, i + 1 == count)))
                        .collect();
                    let page_info = Page::new(page_num, count as u32, page_size as u32, true);
                    return Ok((entries, next_cookie, page_info));
                }
                other => return Err(protocol_error(&format!("unexpected search response tag {other}"))),
            }
        }
    }

    /// Server-Side-Sorting + VLV forward paging: exposes total results and
    /// last-page metadata, unlike [`Ldap::search_paged`].
    pub async fn search_paginated(
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
        self.require_connected()?;
        let req_controls = self.take_request_controls();
        let op = Self::search_request(base, scope, filter, &attrs, false)?;
        let sss = ServerSideSorting { keys: sorting };
        let vlv = Vlv {
            before_count: 0,
            after_count: (page_size - 1).max(0),
            target: VlvTarget::ByOffset { offset, content_count },
            context_id: None,
        };
        let (_msgid, mut rx) = self.submit_multi(op, vec![sss.into(), vlv.into()]).await?;
        let mut entries = Vec::new();
        loop {
            let proto_op = rx.recv().await.ok_or_else(|| {
                LdapError::ServerDown(ErrorInfo::new(52, "connection closed during search"))
            })?;
            match proto_op.op.id {
                4 => {
                    let (dn, attrs) = decode_search_entry(proto_op.op)?;
                    entries.push(Entry::from_response(Some(dn), Some(attrs), &req_controls, &LdapOpResult::default()));
                }
                19 => continue,
                5 => {
                    let raw = decode_ldap_result(proto_op.op, proto_op.controls)?;
                    if raw.result_code != 0 {
                        return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
                    }
                    let vlv_resp = raw
                        .controls
                        .iter()
                        .find(|c| c.ctype == crate::controls::VLV_RESPONSE_OID)
                        .and_then(|c| c.val.clone())
                        .and_then(|v| VlvResponse::parse(&v).ok());
                    let total = vlv_resp.as_ref().map(|v| v.content_count as u32);
                    let last_page = total.map(|t| t.div_ceil(page_size.max(1) as u32));
                    let page_num = (offset / page_size.max(1)) as u32 + 1;
                    let count = entries.len();
                    let entries: Vec<Entry> = entries
                        .into_iter()
                        .enumerate()
                        .map(|(i, e)| {
                            e.with_page(
                                Page::new(page_num, i as u32 + 1, page_size as u32, i + 1 == count)
                                    .with_totals(total, last_page),
                            )
                        })
                        .collect();
                    let page_info = Page::new(page_num, count as u32, page_size as u32, true).with_totals(total, last_page);
                    return Ok((entries, page_info));
                }
                other => return Err(protocol_error(&format!("unexpected search response tag {other}"))),
            }
        }
    }

    // --- Extended operations & schema ---

    pub(crate) async fn extended_raw(&self, exop: Exop, controls: Vec<Control>) -> LdapRes<LdapOpResult> {
        let op = app_tag(23, construct_exop(exop));
        self.submit(|| op.clone(), controls).await
    }

    /// Runs an extended operation and decodes its response value via `R`;
    /// a mismatched or missing `responseName` is a `ProtocolError`.
    pub async fn extended<E, R>(&self, exop: E, controls: Vec<Control>) -> LdapRes<(Entry, R)>
    where
        Exop: From<E>,
        R: ExopParser,
    {
        let req_controls = self.take_request_controls();
        let raw = self.extended_raw(Exop::from(exop), controls).await?;
        if raw.result_code != 0 {
            return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
        }
        let value = raw.value.clone().ok_or_else(|| protocol_error("extended response missing value"))?;
        let resp = R::parse(&value)?;
        let entry = Entry::from_response(None, None, &req_controls, &raw);
        Ok((entry, resp))
    }

    /// Fetches and caches the subschema subentry's `objectClasses`/
    /// `attributeTypes`, for the life of the connection (§5 "Shared
    /// resources"); cleared on [`Ldap::reconnect`].
    pub async fn schema(&self) -> LdapRes<Attributes> {
        if let Some(cached) = self.shared.schema.lock().expect("schema mutex poisoned").clone() {
            return Ok(cached);
        }
        let root = self.search("", Scope::Base, "(objectClass=*)", vec!["subschemaSubentry"], true, Vec::new()).await?;
        let subentry_dn = root
            .into_iter()
            .next()
            .and_then(|e| e.attrs)
            .and_then(|a| a.get_one("subschemaSubentry").map(|v| String::from_utf8_lossy(v).into_owned()))
            .ok_or_else(|| protocol_error("no subschemaSubentry on root DSE"))?;
        let entries = self
            .search(&subentry_dn, Scope::Base, "(objectClass=subschema)", vec!["objectClasses", "attributeTypes"], true, Vec::new())
            .await?;
        let attrs = entries.into_iter().next().and_then(|e| e.attrs).unwrap_or_default();
        *self.shared.schema.lock().expect("schema mutex poisoned") = Some(attrs.clone());
        Ok(attrs)
    }
}

/// Streaming search handle returned by [`Ldap::search_iter`].
pub struct EntryStream {
    ldap: Ldap,
    msgid: i32,
    rx: Option<mpsc::UnboundedReceiver<ProtoOp>>,
    req_controls: Controls,
    done: bool,
}

impl EntryStream {
    /// Next entry, or `None` once the search is exhausted or abandoned.
    pub async fn next(&mut self) -> LdapRes<Option<Entry>> {
        if self.done {
            return Ok(None);
        }
        let rx = match self.rx.as_mut() {
            Some(rx) => rx,
            None => return Ok(None),
        };
        loop {
            let proto_op = match rx.recv().await {
                Some(op) => op,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };
            match proto_op.op.id {
                4 => {
                    let (dn, attrs) = decode_search_entry(proto_op.op)?;
                    return Ok(Some(Entry::from_response(Some(dn), Some(attrs), &self.req_controls, &LdapOpResult::default())));
                }
                19 => continue,
                5 => {
                    self.done = true;
                    let raw = decode_ldap_result(proto_op.op, proto_op.controls)?;
                    if raw.result_code != 0 {
                        return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
                    }
                    return Ok(None);
                }
                other => return Err(protocol_error(&format!("unexpected search response tag {other}"))),
            }
        }
    }

    /// Cancels the stream by abandoning its message id; subsequent `next()`
    /// calls return `Ok(None)`.
    pub async fn abandon(&mut self) -> LdapRes<()> {
        self.done = true;
        self.rx = None;
        self.ldap.abandon(self.msgid).await
    }
}

// --- helpers ---

fn app_tag(id: u64, inner: Vec<Tag>) -> Tag {
    Tag::Sequence(Sequence { id, class: TagClass::Application, inner })
}

fn attribute_list_tag(attrs: &Attributes) -> Tag {
    let inner = attrs
        .iter()
        .map(|(name, values)| {
            Tag::Sequence(Sequence {
                inner: vec![
                    Tag::OctetString(OctetString { inner: name.as_bytes().to_vec(), ..Default::default() }),
                    Tag::Set(Set {
                        inner: values
                            .iter()
                            .map(|v| Tag::OctetString(OctetString { inner: v.clone(), ..Default::default() }))
                            .collect(),
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            })
        })
        .collect();
    Tag::Sequence(Sequence { inner, ..Default::default() })
}

fn mod_to_tag(m: Mod) -> Tag {
    let (op, name, values) = match m {
        Mod::Add(n, v) => (0, n, v),
        Mod::Delete(n, v) => (1, n, v),
        Mod::Replace(n, v) => (2, n, v),
    };
    Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer { inner: op, ..Default::default() }),
            Tag::Sequence(Sequence {
                inner: vec![
                    Tag::OctetString(OctetString { inner: name.as_bytes().to_vec(), ..Default::default() }),
                    Tag::Set(Set {
                        inner: values
                            .into_iter()
                            .map(|v| Tag::OctetString(OctetString { inner: v, ..Default::default() }))
                            .collect(),
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            }),
        ],
        ..Default::default()
    })
}

fn error_info(raw: &LdapOpResult) -> ErrorInfo {
    ErrorInfo::new(raw.result_code, raw.diagnostic_message.clone())
        .with_matched_dn(raw.matched_dn.clone())
        .with_controls(raw.controls.clone())
}

fn finish(dn: Option<Dn>, attrs: Option<Attributes>, req_controls: &Controls, raw: LdapOpResult) -> LdapRes<Entry> {
    if raw.result_code != 0 {
        return Err(LdapError::from_result_code(raw.result_code, error_info(&raw)));
    }
    Ok(Entry::from_response(dn, attrs, req_controls, &raw))
}

fn dispatch(shared: &Arc<Shared>, op: ProtoOp) {
    trace!("received message id {}", op.msgid);
    let mut pending = shared.pending.lock().expect("pending mutex poisoned");
    match op.op.id {
        4 | 19 => {
            // Search entry/reference: keep the Multi sender registered.
            if let Some(Pending::Multi(tx)) = pending.get(&op.msgid) {
                let _ = tx.send(op);
            }
        }
        5 => {
            if let Some(Pending::Multi(tx)) = pending.remove(&op.msgid) {
                let _ = tx.send(op);
            }
        }
        _ => {
            if let Some(Pending::Single(tx)) = pending.remove(&op.msgid) {
                let _ = tx.send(op);
            }
        }
    }
}

fn fail_all_pending(shared: &Arc<Shared>) {
    let mut pending = shared.pending.lock().expect("pending mutex poisoned");
    pending.clear();
}

fn decode_ldap_result(op: StructureTag, controls: Option<StructureTag>) -> LdapRes<LdapOpResult> {
    let op_id = op.id;
    let components = op.expect_constructed().ok_or_else(|| protocol_error("result components"))?;
    let mut it = components.into_iter();
    let rc_tag = it.next().ok_or_else(|| protocol_error("resultCode"))?;
    let rc_bytes = rc_tag.expect_primitive().ok_or_else(|| protocol_error("resultCode bytes"))?;
    let result_code = match parse_uint(&rc_bytes) {
        IResult::Done(_, v) => v as u8,
        _ => return Err(protocol_error("resultCode value")),
    };
    let matched_dn = it
        .next()
        .and_then(|t| t.expect_primitive())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    let diagnostic_message = it
        .next()
        .and_then(|t| t.expect_primitive())
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    let mut referral = Vec::new();
    let mut name = None;
    let mut value = None;
    for tag in it {
        match (tag.class, tag.id) {
            (TagClass::Context, 3) => {
                if let Some(uris) = tag.expect_constructed() {
                    referral = uris
                        .into_iter()
                        .filter_map(|t| t.expect_primitive())
                        .map(|b| String::from_utf8_lossy(&b).into_owned())
                        .collect();
                }
            }
            (TagClass::Context, 10) => {
                name = tag.expect_primitive().map(|b| String::from_utf8_lossy(&b).into_owned());
            }
            (TagClass::Context, 11) => {
                value = tag.expect_primitive();
            }
            _ => {}
        }
    }
    let parsed_controls = match controls {
        Some(c) => crate::controls::parse_controls(c)?,
        None => Vec::new(),
    };
    Ok(LdapOpResult {
        msgid: 0,
        op: response_type(op_id),
        result_code,
        matched_dn,
        diagnostic_message,
        referral,
        controls: parsed_controls,
        name,
        value,
    })
}

fn response_type(id: u64) -> Option<ResponseType> {
    match id {
        1 => Some(ResponseType::Bind),
        4 => Some(ResponseType::SearchResultEntry),
        5 => Some(ResponseType::Search),
        7 => Some(ResponseType::Modify),
        9 => Some(ResponseType::Add),
        11 => Some(ResponseType::Delete),
        13 => Some(ResponseType::ModDn),
        15 => Some(ResponseType::Compare),
        19 => Some(ResponseType::SearchResultReference),
        24 => Some(ResponseType::Extended),
        25 => Some(ResponseType::IntermediateResponse),
        _ => None,
    }
}

fn decode_search_entry(op: StructureTag) -> LdapRes<(Dn, Attributes)> {
    let mut components = op.expect_constructed().ok_or_else(|| protocol_error("search entry"))?.into_iter();
    let object_name = components
        .next()
        .and_then(|t| t.expect_primitive())
        .ok_or_else(|| protocol_error("objectName"))?;
    let dn = Dn::parse(&String::from_utf8_lossy(&object_name))?;
    let attr_list = components.next().and_then(|t| t.expect_constructed()).unwrap_or_default();
    let mut attrs = Attributes::new();
    for partial in attr_list {
        let mut parts = partial.expect_constructed().ok_or_else(|| protocol_error("PartialAttribute"))?.into_iter();
        let name_tag = parts.next().ok_or_else(|| protocol_error("attribute type"))?;
        let name = String::from_utf8_lossy(&name_tag.expect_primitive().ok_or_else(|| protocol_error("attribute type bytes"))?).into_owned();
        let values_tag = parts.next().and_then(|t| t.expect_constructed()).unwrap_or_default();
        let values = values_tag.into_iter().filter_map(|t| t.expect_primitive()).collect();
        attrs.insert(name, values);
    }
    Ok((dn, attrs))
}

async fn open_transport(uri: &str, settings: &LdapConnSettings) -> LdapRes<BoxedStream> {
    let url = Url::parse(uri)?;
    let connect_fut = async {
        match url.scheme() {
            "ldap" => {
                let addr = host_port(&url, 389);
                let tcp = TcpStream::connect(&addr).await.map_err(LdapError::from)?;
                Ok::<BoxedStream, LdapError>(Box::new(tcp))
            }
            "ldaps" => open_tls(&url).await,
            "ldapi" => open_unix(&url).await,
            s => Err(LdapError::Other(ErrorInfo::new(80, format!("unsupported LDAP URL scheme: {s}")))),
        }
    };
    match settings.conn_timeout {
        Some(timeout) => tokio::time::timeout(timeout, connect_fut)
            .await
            .map_err(|_| LdapError::Timeout(ErrorInfo::new(3, "connection timed out")))?,
        None => connect_fut.await,
    }
}

fn host_port(url: &Url, default_port: u16) -> String {
    format!("{}:{}", url.host_str().unwrap_or("localhost"), url.port().unwrap_or(default_port))
}

#[cfg(feature = "tls-native")]
async fn open_tls(url: &Url) -> LdapRes<BoxedStream> {
    let addr = host_port(url, 636);
    let tcp = TcpStream::connect(&addr).await.map_err(LdapError::from)?;
    let cfg = TLS_CONFIG.lock().expect("TLS config mutex poisoned").clone();
    let mut builder = native_tls::TlsConnector::builder();
    if let Some(ca_file) = &cfg.ca_file {
        let pem = std::fs::read(ca_file).map_err(LdapError::from)?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .map_err(|e| LdapError::TlsError(e.to_string()))?;
        builder.add_root_certificate(cert);
    }
    if matches!(cfg.require_cert, CertRequirement::Never) {
        builder.danger_accept_invalid_certs(true);
    }
    let connector: tokio_native_tls::TlsConnector =
        builder.build().map_err(|e| LdapError::TlsError(e.to_string()))?.into();
    let host = url.host_str().unwrap_or("localhost").to_owned();
    let tls = connector.connect(&host, tcp).await.map_err(|e| LdapError::TlsError(e.to_string()))?;
    Ok(Box::new(tls))
}

#[cfg(not(feature = "tls-native"))]
async fn open_tls(_url: &Url) -> LdapRes<BoxedStream> {
    Err(LdapError::TlsError("crate built without the tls-native feature".to_owned()))
}

#[cfg(unix)]
async fn open_unix(url: &Url) -> LdapRes<BoxedStream> {
    let path = percent_encoding::percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
    let unix = UnixStream::connect(path).await.map_err(LdapError::from)?;
    Ok(Box::new(unix))
}

#[cfg(not(unix))]
async fn open_unix(_url: &Url) -> LdapRes<BoxedStream> {
    Err(LdapError::Other(ErrorInfo::new(80, "ldapi:// requires a Unix-like platform")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_allowed_respects_max_attempts() {
        let settings = LdapConnSettings::new().max_connection_attempts(3);
        assert_eq!(settings.max_connection_attempts, 3);
    }

    #[test]
    fn mod_to_tag_preserves_operation_kind() {
        let tag = mod_to_tag(Mod::Replace("cn".into(), vec![b"x".to_vec()]));
        match tag {
            Tag::Sequence(seq) => match &seq.inner[0] {
                Tag::Integer(i) => assert_eq!(i.inner, 2),
                _ => panic!("expected operation code"),
            },
            _ => panic!("expected sequence"),
        }
    }

    #[test]
    fn response_type_maps_known_application_tags() {
        assert_eq!(response_type(9), Some(ResponseType::Add));
        assert_eq!(response_type(255), None);
    }
}
