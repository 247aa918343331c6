//! Top-level wiring: one accept loop plus one scanner per repository.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gristle_core::RepoName;
use gristle_github::GitHubApi;
use gristle_settings::GristleConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::acceptor::{ConnectionAcceptor, bind_listener, load_host_key, ssh_config};
use crate::auth::{AuthGate, AuthorizedKeys};
use crate::broadcast::Broadcaster;
use crate::errors::{Result, ServerError};
use crate::scanner::{RepoScanner, ScanExit};
use crate::session::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;

/// A bound, not yet running relay.
pub struct GristleServer {
    acceptor: ConnectionAcceptor,
    scanners: Vec<RepoScanner>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl GristleServer {
    /// Load keys, bind the listener and build one scanner per configured
    /// repository.
    ///
    /// `apis[i]` serves `config.accounts[i]`, so the lengths must match.
    /// Must be called inside a `tokio` runtime.
    pub fn bind(config: &GristleConfig, apis: &[Arc<dyn GitHubApi>]) -> Result<Self> {
        if apis.len() != config.accounts.len() {
            return Err(ServerError::ApiClients {
                accounts: config.accounts.len(),
                clients: apis.len(),
            });
        }
        let keys = AuthorizedKeys::load(&config.sshd.authorized_keys)?;
        if keys.is_empty() {
            warn!("authorized keys table is empty, every client will be rejected");
        }
        let host_key = load_host_key(&config.sshd.host_key)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.sshd.port));
        let listener = bind_listener(addr, config.sshd.listen_queue)?;

        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let acceptor = ConnectionAcceptor::new(
            listener,
            ssh_config(host_key),
            Arc::new(AuthGate::new(keys)),
            registry.clone(),
            config.sshd.accept_timeout(),
        );

        let scanners = config
            .accounts
            .iter()
            .zip(apis)
            .flat_map(|(account, api)| {
                let broadcaster = broadcaster.clone();
                account.repos.iter().map(move |repo| {
                    RepoScanner::new(
                        repo.name.clone(),
                        repo.period(),
                        api.clone(),
                        broadcaster.clone(),
                    )
                })
            })
            .collect();

        Ok(Self {
            acceptor,
            scanners,
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        })
    }

    /// Address the SSH listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Live session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator shared by every task.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Spawn the accept loop and every scanner.
    pub fn start(self) -> RunningServer {
        let token = self.shutdown.token();
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(self.scanners.len() + 1);

        handles.push(tokio::spawn(self.acceptor.run(token.clone())));

        info!(scanners = self.scanners.len(), "starting repository scanners");
        for scanner in self.scanners {
            let token = token.clone();
            let exit_tx = exit_tx.clone();
            handles.push(tokio::spawn(async move {
                let name = scanner.name().clone();
                let exit = scanner.run(token).await;
                info!(repo = %name, ?exit, "scanner stopped");
                let _ = exit_tx.send((name, exit));
            }));
        }

        RunningServer {
            handles,
            exits: exit_rx,
            registry: self.registry,
            shutdown: self.shutdown,
        }
    }
}

/// A started relay.
pub struct RunningServer {
    handles: Vec<JoinHandle<()>>,
    exits: mpsc::UnboundedReceiver<(RepoName, ScanExit)>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RunningServer {
    /// Live session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Wait for the next scanner to stop. `None` once all have stopped.
    pub async fn next_scanner_exit(&mut self) -> Option<(RepoName, ScanExit)> {
        self.exits.recv().await
    }

    /// Cancel every task and wait up to `timeout` for them to finish.
    pub async fn shutdown(self, timeout: Option<Duration>) -> bool {
        self.shutdown.graceful_shutdown(self.handles, timeout).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{ALICE_KEY, HOST_KEY};
    use assert_matches::assert_matches;
    use gristle_github::mock::MockGitHub;
    use gristle_settings::{AccountConfig, RepoConfig, SshdConfig};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn config(dir: &std::path::Path, repos: &[&str]) -> GristleConfig {
        let host_key = dir.join("host_key");
        let authorized_keys = dir.join("authorized_keys");
        std::fs::write(&host_key, HOST_KEY).unwrap();
        std::fs::write(&authorized_keys, format!("ssh-rsa {ALICE_KEY} alice\n")).unwrap();
        GristleConfig {
            log_file: None,
            sshd: SshdConfig {
                host_key,
                authorized_keys,
                port: 0,
                listen_queue: 16,
                accept_timeout: 5,
            },
            accounts: vec![AccountConfig {
                url: "https://api.github.com".into(),
                username: "relay".into(),
                password: "hunter2".to_string().into(),
                repos: repos
                    .iter()
                    .map(|name| RepoConfig {
                        name: name.parse().unwrap(),
                        polling: 5,
                    })
                    .collect(),
            }],
        }
    }

    #[tokio::test]
    async fn unresolvable_repo_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["acme/widgets", "doesnotexist/repo"]);
        let mock = Arc::new(MockGitHub::new().with_repo("acme/widgets"));
        let apis: Vec<Arc<dyn GitHubApi>> = vec![mock.clone()];

        let server = GristleServer::bind(&cfg, &apis).unwrap();
        let port = server.local_addr().unwrap().port();
        let mut running = server.start();

        let (name, exit) = running.next_scanner_exit().await.unwrap();
        assert_eq!(name.to_string(), "doesnotexist/repo");
        assert_eq!(exit, ScanExit::Unresolved);

        // The accept loop still answers.
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut id = [0u8; 8];
        stream.read_exact(&mut id).await.unwrap();
        assert_eq!(&id, b"SSH-2.0-");

        // The resolvable repository is still being scanned.
        tokio::time::timeout(Duration::from_secs(5), async {
            while mock.fetch_calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        drop(stream);
        assert!(running.shutdown(Some(Duration::from_secs(5))).await);
    }

    #[tokio::test]
    async fn shutdown_stops_scanners_and_accept_loop() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["acme/widgets"]);
        let apis: Vec<Arc<dyn GitHubApi>> =
            vec![Arc::new(MockGitHub::new().with_repo("acme/widgets"))];

        let server = GristleServer::bind(&cfg, &apis).unwrap();
        let token = server.shutdown().token();
        let running = server.start();
        assert!(running.registry().is_empty());

        assert!(running.shutdown(Some(Duration::from_secs(5))).await);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn every_account_needs_an_api_client() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["acme/widgets"]);
        let err = GristleServer::bind(&cfg, &[]).err();
        assert_matches!(
            err,
            Some(ServerError::ApiClients {
                accounts: 1,
                clients: 0
            })
        );
    }

    #[tokio::test]
    async fn missing_authorized_keys_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &[]);
        cfg.sshd.authorized_keys = dir.path().join("missing");
        let apis: Vec<Arc<dyn GitHubApi>> = vec![Arc::new(MockGitHub::new())];
        let err = GristleServer::bind(&cfg, &apis).err();
        assert_matches!(err, Some(ServerError::AuthorizedKeys { .. }));
    }

    #[tokio::test]
    async fn unreadable_host_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &[]);
        std::fs::write(&cfg.sshd.host_key, "garbage").unwrap();
        let apis: Vec<Arc<dyn GitHubApi>> = vec![Arc::new(MockGitHub::new())];
        let err = GristleServer::bind(&cfg, &apis).err();
        assert_matches!(err, Some(ServerError::HostKey { .. }));
    }
}
