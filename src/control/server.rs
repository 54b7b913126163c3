use super::{ControlError, ControlResult, AUTH_FAILED, COMMAND_PROMPT, PASSWORD_PROMPT, USERNAME_PROMPT};
use crate::config::ControlConfig;
use crate::crawler::CrawlProgress;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Status,
    Exit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "stop" | "engine.stop()" => Self::Stop,
            "status" | "est()" => Self::Status,
            "exit" | "quit" => Self::Exit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// TCP console that can stop a running crawl
pub struct ControlServer {
    listener: TcpListener,
    username: String,
    password: String,
    cancel: CancellationToken,
    progress: Arc<CrawlProgress>,
}

impl ControlServer {
    /// Binds the console to the configured address
    ///
    /// # Arguments
    ///
    /// * `config` - Address and credentials
    /// * `cancel` - Cancelled by the `stop` command
    /// * `progress` - Counters reported by the `status` command
    pub async fn bind(
        config: &ControlConfig,
        cancel: CancellationToken,
        progress: Arc<CrawlProgress>,
    ) -> ControlResult<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ControlError::Bind {
                address: address.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            username: config.username.clone(),
            password: config.password.clone(),
            cancel,
            progress,
        })
    }

    pub fn local_addr(&self) -> ControlResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the crawl is stopped
    pub async fn run(self) {
        let address = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        info!("Control channel listening on {}", address);

        let session = Arc::new(Session {
            username: self.username,
            password: self.password,
            cancel: self.cancel.clone(),
            progress: self.progress,
        });

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Control connection from {}", peer);
                        let session = Arc::clone(&session);
                        tokio::spawn(async move {
                            if let Err(e) = session.serve(stream).await {
                                warn!("Control connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("Control accept error: {}", e),
                },
                _ = self.cancel.cancelled() => break,
            }
        }

        debug!("Control channel closed");
    }
}

struct Session {
    username: String,
    password: String,
    cancel: CancellationToken,
    progress: Arc<CrawlProgress>,
}

impl Session {
    async fn serve(&self, stream: TcpStream) -> ControlResult<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(USERNAME_PROMPT.as_bytes()).await?;
        let Some(username) = lines.next_line().await? else {
            return Ok(());
        };
        writer.write_all(PASSWORD_PROMPT.as_bytes()).await?;
        let Some(password) = lines.next_line().await? else {
            return Ok(());
        };

        if username.trim() != self.username || password.trim() != self.password {
            warn!("Control login rejected for user '{}'", username.trim());
            writer
                .write_all(format!("{}\r\n", AUTH_FAILED).as_bytes())
                .await?;
            return Ok(());
        }

        loop {
            writer.write_all(COMMAND_PROMPT.as_bytes()).await?;
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };

            let reply = match Command::parse(&line) {
                Command::Empty => continue,
                Command::Exit => return Ok(()),
                Command::Stop => {
                    info!("Stop requested through the control channel");
                    self.cancel.cancel();
                    writer.write_all(b"Stopping crawl\r\n").await?;
                    return Ok(());
                }
                Command::Status => format!(
                    "discovered: {}, in flight: {}, emitted: {}, failed: {}",
                    self.progress.discovered(),
                    self.progress.in_flight(),
                    self.progress.emitted(),
                    self.progress.failed()
                ),
                Command::Unknown(other) => format!("Unknown command: {}", other),
            };

            writer.write_all(format!("{}\r\n", reply).as_bytes()).await?;
        }
    }
}
