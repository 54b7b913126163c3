use super::{ControlError, ControlResult, AUTH_FAILED, COMMAND_PROMPT, PASSWORD_PROMPT, USERNAME_PROMPT};
use crate::config::ControlConfig;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Logs into a running crawl's control channel and sends one command
///
/// # Returns
///
/// The server's reply with the prompts stripped
pub async fn send_command(config: &ControlConfig, command: &str) -> ControlResult<String> {
    let address = config.address();
    let mut stream = TcpStream::connect(&address)
        .await
        .map_err(|source| ControlError::Connect {
            address: address.clone(),
            source,
        })?;

    // The session ends after the command (or after `stop`), so the whole
    // reply is read up to EOF.
    let script = format!(
        "{}\n{}\n{}\nexit\n",
        config.username, config.password, command
    );
    stream.write_all(script.as_bytes()).await?;
    stream.flush().await?;

    let mut transcript = String::new();
    tokio::time::timeout(REPLY_TIMEOUT, stream.read_to_string(&mut transcript))
        .await
        .map_err(|_| ControlError::Timeout(REPLY_TIMEOUT))??;

    if transcript.contains(AUTH_FAILED) {
        return Err(ControlError::AuthenticationFailed);
    }

    let reply = [USERNAME_PROMPT, PASSWORD_PROMPT, COMMAND_PROMPT]
        .iter()
        .fold(transcript, |text, prompt| text.replace(prompt, ""));
    Ok(reply.trim().to_string())
}

/// Asks a running crawl to stop
pub async fn send_stop(config: &ControlConfig) -> ControlResult<String> {
    send_command(config, "stop").await
}
