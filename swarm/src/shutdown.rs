//! Shutdown triggers
//!
//! A run stops on SIGINT, SIGTERM, or a `shutdown` line on stdin. The stdin
//! line is how a supervisor tells its worker processes to stop.

use std::future::pending;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Line a supervisor writes to a worker's stdin
pub const SHUTDOWN_MESSAGE: &str = "shutdown";

/// Resolves with the signal's name
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

/// True once a shutdown line is read, false if the stream ends first
pub async fn wait_for_message<R: AsyncRead + Unpin>(reader: R) -> bool {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim() == SHUTDOWN_MESSAGE => return true,
            Ok(Some(_)) => continue,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("SWARM: Control channel read failed: {}", e);
                return false;
            }
        }
    }
}

/// Cancel `token` on the first trigger. Stdin is only watched when asked.
pub fn spawn_listener(token: CancellationToken, watch_stdin: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = async {
            match wait_for_signal().await {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!("SWARM: Signal handlers unavailable: {}", e);
                    pending().await
                }
            }
        };

        let message = async {
            if watch_stdin && wait_for_message(tokio::io::stdin()).await {
                "shutdown message"
            } else {
                pending().await
            }
        };

        let reason = tokio::select! {
            reason = signal => reason,
            reason = message => reason,
            _ = token.cancelled() => return,
        };

        tracing::info!("SWARM: Shutting down on {}", reason);
        token.cancel();
    })
}
