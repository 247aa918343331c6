//! SSH front end: listening socket, accept loop and per-connection setup.
//!
//! Each accepted connection runs in its own task. The task negotiates the
//! SSH session, waits for the client to open a `session` channel, sends
//! the banner, registers a [`Session`] and then becomes that session's
//! writer until the client leaves or shutdown is requested. A failure at
//! any step aborts only that connection.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gristle_core::{SERVICE_NAME, VERSION};
use metrics::counter;
use russh::server::{self, Auth, Msg, Session as SshSession};
use russh::{Channel, ChannelId, ChannelMsg, Disconnect, MethodSet, Pty};
use russh_keys::PublicKeyBase64;
use russh_keys::key::{KeyPair, PublicKey};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::auth::{AuthDecision, ChannelKind, ConnectionPolicy};
use crate::errors::{ConnectionError, Result, ServerError};
use crate::metrics::{CONNECTIONS_TOTAL, CONNECTION_FAILURES_TOTAL};
use crate::session::{Session, SessionRegistry};

/// Client bytes that end a session: Ctrl-C and Ctrl-D.
const INTERRUPT_BYTES: [u8; 2] = [0x03, 0x04];

/// Pause after a failed `accept()` so descriptor exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Greeting sent once a session channel is open.
pub fn banner() -> String {
    format!("Welcome to {SERVICE_NAME} v{VERSION}!\r\n")
}

/// Create a listening socket on `addr` with `SO_REUSEADDR` and `backlog`.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let bind_err = |source| ServerError::Bind { addr, source };
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket
        .listen(backlog)
        .map_err(|source| ServerError::Listen { addr, source })
}

/// Read an unencrypted OpenSSH or PEM private key.
pub fn load_host_key(path: &Path) -> Result<KeyPair> {
    russh_keys::load_secret_key(path, None).map_err(|e| ServerError::HostKey {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Server configuration offering only public-key authentication.
pub fn ssh_config(host_key: KeyPair) -> Arc<server::Config> {
    Arc::new(server::Config {
        keys: vec![host_key],
        methods: MethodSet::PUBLICKEY,
        ..Default::default()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// SSH handler
// ─────────────────────────────────────────────────────────────────────────────

/// The session channel handed from the SSH handler to the connection task.
struct OpenedChannel {
    channel: Channel<Msg>,
    identity: String,
}

/// Per-connection `russh` handler; all decisions go through the policy.
struct SshHandler {
    policy: Arc<dyn ConnectionPolicy>,
    peer: SocketAddr,
    identity: Option<String>,
    opened: Option<oneshot::Sender<OpenedChannel>>,
}

impl SshHandler {
    fn new(
        policy: Arc<dyn ConnectionPolicy>,
        peer: SocketAddr,
        opened: oneshot::Sender<OpenedChannel>,
    ) -> Self {
        Self {
            policy,
            peer,
            identity: None,
            opened: Some(opened),
        }
    }
}

#[async_trait::async_trait]
impl server::Handler for SshHandler {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> std::result::Result<Auth, Self::Error> {
        match self.policy.authenticate(user, &public_key.public_key_bytes()) {
            AuthDecision::Accepted => {
                self.identity = Some(user.to_lowercase());
                Ok(Auth::Accept)
            }
            AuthDecision::Rejected => Ok(Auth::Reject {
                proceed_with_methods: None,
            }),
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut SshSession,
    ) -> std::result::Result<bool, Self::Error> {
        if !self.policy.approve_channel(ChannelKind::Session) {
            return Ok(false);
        }
        let Some(identity) = self.identity.clone() else {
            return Ok(false);
        };
        let Some(opened) = self.opened.take() else {
            debug!(peer = %self.peer, "refusing second session channel");
            return Ok(false);
        };
        Ok(opened.send(OpenedChannel { channel, identity }).is_ok())
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut SshSession,
    ) -> std::result::Result<(), Self::Error> {
        if self.policy.approve_pty() {
            let _ = session.channel_success(channel);
        } else {
            let _ = session.channel_failure(channel);
        }
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut SshSession,
    ) -> std::result::Result<(), Self::Error> {
        if self.policy.approve_shell() {
            let _ = session.channel_success(channel);
        } else {
            let _ = session.channel_failure(channel);
        }
        Ok(())
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut SshSession,
    ) -> std::result::Result<bool, Self::Error> {
        let approved = self.policy.approve_channel(ChannelKind::Other);
        debug!(
            peer = %self.peer,
            host_to_connect,
            port_to_connect,
            approved,
            "port forwarding requested"
        );
        Ok(approved)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accept loop
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    config: Arc<server::Config>,
    policy: Arc<dyn ConnectionPolicy>,
    registry: Arc<SessionRegistry>,
    accept_timeout: Duration,
}

/// Accepts SSH clients and turns them into registered sessions.
pub struct ConnectionAcceptor {
    listener: TcpListener,
    ctx: ConnectionContext,
}

impl ConnectionAcceptor {
    /// Acceptor over a bound listener.
    ///
    /// `accept_timeout` bounds the whole setup: SSH negotiation plus the
    /// wait for a session channel.
    pub fn new(
        listener: TcpListener,
        config: Arc<server::Config>,
        policy: Arc<dyn ConnectionPolicy>,
        registry: Arc<SessionRegistry>,
        accept_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            ctx: ConnectionContext {
                config,
                policy,
                registry,
                accept_timeout,
            },
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until cancelled, then wait for open connections to finish.
    pub async fn run(self, cancel: CancellationToken) {
        let mut connections = JoinSet::new();
        info!(addr = ?self.listener.local_addr().ok(), "accepting SSH connections");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        counter!(CONNECTIONS_TOTAL).increment(1);
                        let ctx = self.ctx.clone();
                        let cancel = cancel.clone();
                        let _ = connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, peer, ctx, cancel).await {
                                warn!(%peer, error = %e, "connection aborted");
                                counter!(CONNECTION_FAILURES_TOTAL, "reason" => failure_reason(&e))
                                    .increment(1);
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        info!(open = connections.len(), "accept loop stopped, draining connections");
        while connections.join_next().await.is_some() {}
    }
}

fn failure_reason(err: &ConnectionError) -> &'static str {
    match err {
        ConnectionError::Negotiation(_) => "negotiation",
        ConnectionError::NegotiationTimeout(_) => "negotiation_timeout",
        ConnectionError::ChannelTimeout(_) => "channel_timeout",
        ConnectionError::ChannelClosed => "channel_closed",
        ConnectionError::Send(_) => "send",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-connection setup and session writer
// ─────────────────────────────────────────────────────────────────────────────

/// Why a registered session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    ClientClosed,
    ClientInterrupt,
    Evicted,
    WriteFailed,
}

#[instrument(skip_all, fields(%peer))]
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: ConnectionContext,
    cancel: CancellationToken,
) -> std::result::Result<(), ConnectionError> {
    debug!("negotiating SSH session");
    let deadline = Instant::now() + ctx.accept_timeout;
    let (opened_tx, opened_rx) = oneshot::channel();
    let handler = SshHandler::new(ctx.policy.clone(), peer, opened_tx);

    let negotiated = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        r = timeout_at(deadline, server::run_stream(ctx.config.clone(), stream, handler)) => r,
    };
    let running =
        negotiated.map_err(|_| ConnectionError::NegotiationTimeout(ctx.accept_timeout))??;
    let transport = running.handle();
    tokio::pin!(running);

    let waited = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            disconnect(&transport, "server shutting down").await;
            return Ok(());
        }
        r = timeout_at(deadline, opened_rx) => r,
    };
    let OpenedChannel {
        mut channel,
        identity,
    } = match waited {
        Ok(Ok(opened)) => opened,
        Ok(Err(_)) => {
            // The handler is gone, so the session loop has ended.
            return match running.await {
                Err(e) => Err(ConnectionError::Negotiation(e)),
                Ok(()) => Err(ConnectionError::ChannelClosed),
            };
        }
        Err(_) => {
            disconnect(&transport, "no session channel").await;
            return Err(ConnectionError::ChannelTimeout(ctx.accept_timeout));
        }
    };

    if let Err(e) = channel.data(banner().as_bytes()).await {
        disconnect(&transport, "banner write failed").await;
        return Err(ConnectionError::Send(e.to_string()));
    }

    let (session, rx) = Session::open(identity, Some(peer));
    let session_id = session.id();
    let connected_at = session.connected_at();
    ctx.registry.register(Arc::new(session));
    info!(session_id, sessions = ctx.registry.len(), "session registered");

    let end = write_session(&mut channel, rx, &cancel).await;

    let _ = ctx.registry.unregister(session_id);
    let connected_secs = (Utc::now() - connected_at).num_seconds();
    info!(session_id, reason = ?end, connected_secs, "session ended");
    let _ = channel.close().await;
    disconnect(&transport, "session ended").await;
    Ok(())
}

/// Copy queued lines to the channel and watch client input until the
/// session ends.
async fn write_session(
    channel: &mut Channel<Msg>,
    mut rx: mpsc::Receiver<Arc<str>>,
    cancel: &CancellationToken,
) -> SessionEnd {
    enum Step {
        Line(Option<Arc<str>>),
        Input(Option<ChannelMsg>),
    }

    loop {
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => return SessionEnd::Shutdown,
            msg = channel.wait() => Step::Input(msg),
            line = rx.recv() => Step::Line(line),
        };

        match step {
            Step::Line(Some(line)) => {
                if let Err(e) = channel.data(line.as_bytes()).await {
                    debug!(error = %e, "channel write failed");
                    return SessionEnd::WriteFailed;
                }
            }
            // The registry dropped the session and nothing else holds it.
            Step::Line(None) => return SessionEnd::Evicted,
            Step::Input(None | Some(ChannelMsg::Eof | ChannelMsg::Close)) => {
                return SessionEnd::ClientClosed;
            }
            Step::Input(Some(ChannelMsg::Data { data })) => {
                if data.iter().any(|b| INTERRUPT_BYTES.contains(b)) {
                    return SessionEnd::ClientInterrupt;
                }
            }
            Step::Input(Some(_)) => {}
        }
    }
}

async fn disconnect(transport: &server::Handle, reason: &str) {
    let _ = transport
        .disconnect(Disconnect::ByApplication, reason.to_string(), "en".to_string())
        .await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{ALICE_KEY, CLIENT_KEY, CLIENT_PUBLIC_KEY, HOST_KEY, OTHER_KEY};
    use crate::auth::{AuthGate, AuthorizedKeys};
    use crate::broadcast::Broadcaster;
    use chrono::TimeZone;
    use gristle_core::RepoEvent;
    use russh::client;
    use russh::server::Handler;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    fn alice_policy() -> Arc<dyn ConnectionPolicy> {
        Arc::new(AuthGate::new(AuthorizedKeys::parse(&format!(
            "ssh-rsa {ALICE_KEY} alice\n"
        ))))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn acceptor(accept_timeout: Duration) -> (ConnectionAcceptor, Arc<SessionRegistry>) {
        acceptor_with(alice_policy(), accept_timeout)
    }

    fn acceptor_with(
        policy: Arc<dyn ConnectionPolicy>,
        accept_timeout: Duration,
    ) -> (ConnectionAcceptor, Arc<SessionRegistry>) {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let key = russh_keys::decode_secret_key(HOST_KEY, None).unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let acceptor = ConnectionAcceptor::new(
            listener,
            ssh_config(key),
            policy,
            registry.clone(),
            accept_timeout,
        );
        (acceptor, registry)
    }

    // ── Real SSH clients ──

    struct AnyHostKey;

    #[async_trait::async_trait]
    impl client::Handler for AnyHostKey {
        type Error = russh::Error;

        async fn check_server_key(
            &mut self,
            _server_public_key: &PublicKey,
        ) -> std::result::Result<bool, Self::Error> {
            Ok(true)
        }
    }

    /// A running accept loop that knows the RSA client key as `alice`.
    struct Relay {
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        client_key: Arc<KeyPair>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
        _dir: tempfile::TempDir,
    }

    impl Relay {
        fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let key_path = dir.path().join("id_rsa");
            std::fs::write(&key_path, CLIENT_KEY).unwrap();
            let client_key = Arc::new(russh_keys::load_secret_key(&key_path, None).unwrap());

            let policy: Arc<dyn ConnectionPolicy> = Arc::new(AuthGate::new(
                AuthorizedKeys::parse(&format!("ssh-rsa {CLIENT_PUBLIC_KEY} alice\n")),
            ));
            let (acceptor, registry) = acceptor_with(policy, Duration::from_secs(5));
            let addr = acceptor.local_addr().unwrap();
            let cancel = CancellationToken::new();
            let task = tokio::spawn(acceptor.run(cancel.clone()));
            Self {
                addr,
                registry,
                client_key,
                cancel,
                task,
                _dir: dir,
            }
        }

        async fn login(&self, user: &str) -> (client::Handle<AnyHostKey>, bool) {
            let config = Arc::new(client::Config::default());
            let mut handle = client::connect(config, self.addr, AnyHostKey).await.unwrap();
            let accepted = handle
                .authenticate_publickey(user, self.client_key.clone())
                .await
                .unwrap();
            (handle, accepted)
        }

        /// Log in as `user`, open a session channel and read the banner.
        async fn open_session(
            &self,
            user: &str,
        ) -> (client::Handle<AnyHostKey>, Channel<client::Msg>) {
            let (handle, accepted) = self.login(user).await;
            assert!(accepted);
            let mut channel = handle.channel_open_session().await.unwrap();
            assert_eq!(read_line(&mut channel).await, banner());
            (handle, channel)
        }

        async fn stop(self) {
            self.cancel.cancel();
            timeout(Duration::from_secs(5), self.task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    async fn read_line(channel: &mut Channel<client::Msg>) -> String {
        let mut buf = Vec::new();
        while !buf.ends_with(b"\r\n") {
            match timeout(Duration::from_secs(5), channel.wait()).await.unwrap() {
                Some(ChannelMsg::Data { data }) => buf.extend_from_slice(&data),
                Some(_) => {}
                None => panic!("channel closed after {buf:?}"),
            }
        }
        String::from_utf8(buf).unwrap()
    }

    async fn eventually(what: &str, cond: impl Fn() -> bool) {
        let waited = timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {what}");
    }

    #[test]
    fn banner_names_service_and_version() {
        assert_eq!(banner(), format!("Welcome to Gristle v{VERSION}!\r\n"));
    }

    #[tokio::test]
    async fn matching_key_is_accepted_case_insensitively() {
        let (tx, _rx) = oneshot::channel();
        let mut handler = SshHandler::new(alice_policy(), peer(), tx);
        let key = russh_keys::parse_public_key_base64(ALICE_KEY).unwrap();

        let auth = handler.auth_publickey("Alice", &key).await.unwrap();
        assert!(matches!(auth, Auth::Accept));
        assert_eq!(handler.identity.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_without_identity() {
        let (tx, _rx) = oneshot::channel();
        let mut handler = SshHandler::new(alice_policy(), peer(), tx);
        let key = russh_keys::parse_public_key_base64(ALICE_KEY).unwrap();

        let auth = handler.auth_publickey("bob", &key).await.unwrap();
        assert!(matches!(auth, Auth::Reject { .. }));
        assert!(handler.identity.is_none());

        let other = russh_keys::parse_public_key_base64(OTHER_KEY).unwrap();
        let auth = handler.auth_publickey("alice", &other).await.unwrap();
        assert!(matches!(auth, Auth::Reject { .. }));
        assert!(handler.identity.is_none());
    }

    #[tokio::test]
    async fn bad_connections_do_not_stop_the_accept_loop() {
        let (acceptor, registry) = acceptor(Duration::from_secs(5));
        let addr = acceptor.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(acceptor.run(cancel.clone()));

        for junk in [&b"GET / HTTP/1.1\r\n\r\n"[..], &b"\x00\x01\x02\x03"[..]] {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(junk).await.unwrap();
            drop(stream);
        }

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut id = [0u8; 8];
        stream.read_exact(&mut id).await.unwrap();
        assert_eq!(&id, b"SSH-2.0-");
        assert!(registry.is_empty());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn silent_client_times_out() {
        let (acceptor, registry) = acceptor(Duration::from_millis(200));
        let addr = acceptor.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(acceptor.run(cancel.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut rest = Vec::new();
        // The server drops the connection once the setup deadline passes.
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.starts_with(b"SSH-2.0-"));
        assert!(registry.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn session_gets_banner_then_broadcast_lines() {
        let relay = Relay::start();
        let (_handle, mut channel) = relay.open_session("Alice").await;

        eventually("registration", || relay.registry.len() == 1).await;
        let session = relay.registry.snapshot().remove(0);
        assert_eq!(session.identity(), "alice");
        assert!(session.peer().is_some());

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let event = RepoEvent::new(
            json!({"id": "1", "type": "PushEvent", "created_at": at.to_rfc3339()}),
            at,
        );
        let report = Broadcaster::new(relay.registry.clone()).publish(&event);
        assert_eq!(report.delivered, 1);
        assert_eq!(read_line(&mut channel).await, event.to_line());

        let registry = relay.registry.clone();
        relay.stop().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn interrupt_bytes_end_the_session() {
        let relay = Relay::start();
        for byte in [0x03_u8, 0x04] {
            let (_handle, channel) = relay.open_session("alice").await;
            eventually("registration", || relay.registry.len() == 1).await;

            channel.data(&[byte][..]).await.unwrap();
            eventually("unregistration", || relay.registry.is_empty()).await;
        }
        relay.stop().await;
    }

    #[tokio::test]
    async fn client_eof_ends_the_session() {
        let relay = Relay::start();
        let (_handle, channel) = relay.open_session("alice").await;
        eventually("registration", || relay.registry.len() == 1).await;

        channel.eof().await.unwrap();
        eventually("unregistration", || relay.registry.is_empty()).await;
        relay.stop().await;
    }

    #[tokio::test]
    async fn rejected_identity_is_never_registered() {
        let relay = Relay::start();

        let (_bob, accepted) = relay.login("bob").await;
        assert!(!accepted);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(relay.registry.is_empty());

        // The accept loop keeps serving after the rejection.
        let (_alice, _channel) = relay.open_session("alice").await;
        eventually("registration", || relay.registry.len() == 1).await;
        relay.stop().await;
    }

    #[tokio::test]
    async fn forwarding_channels_are_refused() {
        let relay = Relay::start();
        let (handle, accepted) = relay.login("alice").await;
        assert!(accepted);

        let forwarded = handle
            .channel_open_direct_tcpip("localhost", 80, "127.0.0.1", 40000)
            .await;
        assert!(forwarded.is_err());
        assert!(relay.registry.is_empty());

        let mut channel = handle.channel_open_session().await.unwrap();
        assert_eq!(read_line(&mut channel).await, banner());
        relay.stop().await;
    }

    #[test]
    fn failure_reasons_separate_negotiation_and_channel_timeouts() {
        let limit = Duration::from_secs(20);
        assert_eq!(
            failure_reason(&ConnectionError::NegotiationTimeout(limit)),
            "negotiation_timeout"
        );
        assert_eq!(
            failure_reason(&ConnectionError::ChannelTimeout(limit)),
            "channel_timeout"
        );
    }

    #[test]
    fn load_host_key_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host_key");
        std::fs::write(&path, "not a key").unwrap();
        let err = load_host_key(&path).unwrap_err();
        assert!(matches!(err, ServerError::HostKey { .. }));
        assert!(err.to_string().contains("host_key"));
    }

    #[test]
    fn load_host_key_reads_openssh_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host_ed25519");
        std::fs::write(&path, HOST_KEY).unwrap();
        let _key = load_host_key(&path).unwrap();
    }

    #[tokio::test]
    async fn bind_listener_on_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 8).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
