//! Session lifecycle for the control endpoint.
//!
//! The wire exchange is deliberately small. On connect the client sends one
//! line, `AUTH <digest>`, and the wrapper answers `AUTH_OK` or
//! `AUTH_ERROR <reason>` exactly once. After `AUTH_OK` the session is ready:
//! commands go out as single lines with no acknowledgement, and every line
//! the wrapper sends from then on is an asynchronous server notification.
//! Notifications are pumped into a channel by a background reader task, so
//! nothing here runs user code inside an I/O callback.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{AuthConfig, ControlConfig};

const AUTH_OK: &str = "AUTH_OK";
const AUTH_ERROR: &str = "AUTH_ERROR";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Closed,
    Failed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to control endpoint {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("control endpoint closed the connection during authentication")]
    HandshakeEof,

    #[error("no authentication reply within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("unexpected handshake reply: {0}")]
    UnexpectedReply(String),

    #[error("session is {0:?}, expected Ready")]
    NotReady(SessionState),

    #[error("control session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct ControlSession {
    state: SessionState,
    writer: Option<BoxedWriter>,
    messages: Option<mpsc::UnboundedReceiver<String>>,
    reader_task: Option<JoinHandle<()>>,
}

impl Default for ControlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            writer: None,
            messages: None,
            reader_task: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connect over TCP and run the auth handshake. On return the session is
    /// either `Ready` or `Failed`; a `Failed` session cannot be reused.
    pub async fn connect(&mut self, config: &ControlConfig) -> Result<(), SessionError> {
        let endpoint = config.endpoint();
        debug!(%endpoint, "connecting to control endpoint");
        self.state = SessionState::Connecting;
        let stream = match TcpStream::connect(&endpoint).await {
            Ok(stream) => stream,
            Err(source) => {
                self.state = SessionState::Failed;
                return Err(SessionError::Connect { endpoint, source });
            }
        };
        self.establish(stream, &config.auth).await
    }

    /// Run the auth handshake over an already-open transport. Split out from
    /// [`connect`](Self::connect) so the session can ride any ordered byte
    /// stream (tests use an in-memory duplex).
    pub async fn establish<S>(&mut self, stream: S, auth: &AuthConfig) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.state = SessionState::Authenticating;
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut lines = BufReader::new(read_half).lines();

        if let Err(err) = write_half
            .write_all(format!("AUTH {}\n", auth.digest()).as_bytes())
            .await
        {
            self.state = SessionState::Failed;
            return Err(SessionError::Io(err));
        }

        let reply = match timeout(HANDSHAKE_TIMEOUT, lines.next_line()).await {
            Err(_) => {
                self.state = SessionState::Failed;
                return Err(SessionError::HandshakeTimeout(HANDSHAKE_TIMEOUT));
            }
            Ok(Err(err)) => {
                self.state = SessionState::Failed;
                return Err(SessionError::Io(err));
            }
            Ok(Ok(None)) => {
                self.state = SessionState::Failed;
                return Err(SessionError::HandshakeEof);
            }
            Ok(Ok(Some(line))) => line,
        };

        if reply == AUTH_OK {
            debug!("authenticated to control endpoint");
        } else if let Some(reason) = reply.strip_prefix(AUTH_ERROR) {
            self.state = SessionState::Failed;
            return Err(SessionError::Auth(reason.trim().to_string()));
        } else {
            self.state = SessionState::Failed;
            return Err(SessionError::UnexpectedReply(reply));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("control endpoint closed the connection");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "control session read failed");
                        break;
                    }
                }
            }
        });

        self.writer = Some(Box::new(write_half));
        self.messages = Some(rx);
        self.reader_task = Some(reader_task);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Send one console command. Fire-and-forget: the wrapper processes
    /// commands in receipt order and sends no acknowledgement.
    pub async fn send_command(&mut self, command: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(SessionError::NotReady(self.state));
        };
        debug!(%command, "sending control command");
        writer.write_all(command.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Next asynchronous server notification. Returns `None` once the
    /// session is closed or the endpoint has gone away and the queue is
    /// drained. Notifications never change session state.
    pub async fn next_message(&mut self) -> Option<String> {
        match self.messages.as_mut() {
            Some(messages) => messages.recv().await,
            None => None,
        }
    }

    /// Tear the session down. Valid from any state and idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.messages = None;
        self.state = SessionState::Closed;
    }
}

impl Drop for ControlSession {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    use super::*;
    use crate::config::AuthMethod;

    fn auth() -> AuthConfig {
        AuthConfig {
            password: "hunter2".into(),
            method: AuthMethod::Plain,
        }
    }

    /// Accepts any AUTH line, replies as told, then forwards `chatter` and
    /// echoes received command lines into a channel.
    fn fake_wrapper(
        stream: DuplexStream,
        verdict: &'static str,
        chatter: Vec<&'static str>,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(stream);
            let mut lines = BufReader::new(read_half).lines();

            let first = lines.next_line().await.unwrap().unwrap();
            assert!(first.starts_with("AUTH "), "expected AUTH line, got {first}");
            write_half
                .write_all(format!("{verdict}\n").as_bytes())
                .await
                .unwrap();
            for line in chatter {
                write_half
                    .write_all(format!("{line}\n").as_bytes())
                    .await
                    .unwrap();
            }

            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        rx
    }

    #[tokio::test]
    async fn handshake_success_reaches_ready() {
        let (client, server) = tokio::io::duplex(1024);
        let _commands = fake_wrapper(server, "AUTH_OK", vec![]);

        let mut session = ControlSession::new();
        session.establish(client, &auth()).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn handshake_rejection_fails_with_reason() {
        let (client, server) = tokio::io::duplex(1024);
        let _commands = fake_wrapper(server, "AUTH_ERROR bad password", vec![]);

        let mut session = ControlSession::new();
        let err = session.establish(client, &auth()).await.unwrap_err();
        match err {
            SessionError::Auth(reason) => assert_eq!(reason, "bad password"),
            other => panic!("expected Auth error, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn endpoint_hangup_during_handshake_fails() {
        let (client, server) = tokio::io::duplex(1024);
        // Reads the AUTH line, then hangs up without a verdict.
        tokio::spawn(async move {
            let mut lines = BufReader::new(server).lines();
            let _ = lines.next_line().await;
        });

        let mut session = ControlSession::new();
        let err = session.establish(client, &auth()).await.unwrap_err();
        assert!(matches!(err, SessionError::HandshakeEof));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn commands_are_written_as_lines() {
        let (client, server) = tokio::io::duplex(1024);
        let mut commands = fake_wrapper(server, "AUTH_OK", vec![]);

        let mut session = ControlSession::new();
        session.establish(client, &auth()).await.unwrap();
        session.send_command("save-off").await.unwrap();
        session.send_command("save-all").await.unwrap();

        assert_eq!(commands.recv().await.unwrap(), "save-off");
        assert_eq!(commands.recv().await.unwrap(), "save-all");
    }

    #[tokio::test]
    async fn send_command_outside_ready_is_rejected() {
        let mut session = ControlSession::new();
        let err = session.send_command("save-all").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotReady(SessionState::Disconnected)
        ));

        session.close().await;
        let err = session.send_command("save-all").await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady(SessionState::Closed)));
    }

    #[tokio::test]
    async fn notifications_are_delivered_in_order() {
        let (client, server) = tokio::io::duplex(1024);
        let _commands = fake_wrapper(
            server,
            "AUTH_OK",
            vec!["[Server] Saving the game", "[Server] Saved the game"],
        );

        let mut session = ControlSession::new();
        session.establish(client, &auth()).await.unwrap();
        assert_eq!(
            session.next_message().await.unwrap(),
            "[Server] Saving the game"
        );
        assert_eq!(
            session.next_message().await.unwrap(),
            "[Server] Saved the game"
        );
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn close_is_idempotent_from_any_state() {
        let mut session = ControlSession::new();
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        let (client, server) = tokio::io::duplex(1024);
        let _commands = fake_wrapper(server, "AUTH_OK", vec![]);
        let mut session = ControlSession::new();
        session.establish(client, &auth()).await.unwrap();
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.next_message().await.is_none());
    }

    #[tokio::test]
    async fn connect_failure_marks_session_failed() {
        // Port 1 on localhost is essentially never listening.
        let config = ControlConfig {
            address: "127.0.0.1".into(),
            port: 1,
            auth: auth(),
        };
        let mut session = ControlSession::new();
        let err = session.connect(&config).await.unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }
}
