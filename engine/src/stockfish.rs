use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::uci::{parse_uci_message, UciError, UciMessage};

const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// One long-lived engine process, line-oriented UCI over stdin/stdout.
pub struct StockfishProcess {
    child: Child,
    stdin_tx: mpsc::Sender<String>,
    msg_rx: mpsc::Receiver<UciMessage>,
}

impl StockfishProcess {
    /// Spawn and perform the `uci` handshake.
    #[tracing::instrument(level = "info")]
    pub async fn spawn() -> Result<Self, UciError> {
        let path = find_stockfish_path().ok_or(UciError::BinaryNotFound)?;
        tracing::info!("Spawning engine process at {:?}", path);

        let mut child = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or(UciError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(UciError::NoStdout)?;

        stdin.write_all(b"uci\n").await?;
        stdin.flush().await?;

        let (msg_tx, msg_rx) = mpsc::channel::<UciMessage>(64);

        // Output reader task.
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("UCI << {}", trimmed);
                        if let Ok(msg) = parse_uci_message(trimmed) {
                            if msg_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Engine reader task exiting");
        });

        // Wait for uciok.
        let mut msg_rx = msg_rx;
        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(msg) = msg_rx.recv().await {
                if matches!(msg, UciMessage::UciOk | UciMessage::ReadyOk) {
                    return Ok(());
                }
            }
            Err(UciError::HandshakeClosed)
        })
        .await;

        match handshake {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(UciError::HandshakeTimeout),
        }

        // Stdin writer task.
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(64);
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                tracing::trace!("UCI >> {}", cmd.trim());
                if let Err(e) = stdin.write_all(cmd.as_bytes()).await {
                    tracing::error!("Failed to write to engine stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush engine stdin: {}", e);
                    break;
                }
            }
            tracing::debug!("Engine writer task exiting");
        });

        let _ = stdin_tx.send("isready\n".to_string()).await;

        tracing::info!("Engine process ready");
        Ok(Self {
            child,
            stdin_tx,
            msg_rx,
        })
    }

    /// Queue one command line for the engine. The trailing newline is added.
    pub async fn send(&self, line: impl Into<String>) {
        let mut cmd = line.into();
        cmd.push('\n');
        if self.stdin_tx.send(cmd).await.is_err() {
            tracing::warn!("Engine stdin channel closed");
        }
    }

    /// Receive the next parsed message from the engine.
    pub async fn recv(&mut self) -> Option<UciMessage> {
        self.msg_rx.recv().await
    }

    /// Ask the engine to quit, then reap the process.
    pub async fn shutdown(mut self) {
        self.send("quit").await;
        let _ =
            tokio::time::timeout(std::time::Duration::from_secs(1), self.child.wait()).await;
        let _ = self.child.kill().await;
    }
}

/// Locate the engine binary: explicit env override first, then common
/// install locations, then PATH.
fn find_stockfish_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("STOCKFISH_PATH") {
        return Some(PathBuf::from(path));
    }

    let candidates = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish",
    ];

    for path_str in candidates {
        let path = Path::new(path_str);
        if path.exists() || path_str == "stockfish" {
            if std::process::Command::new(path_str)
                .arg("--help")
                .output()
                .is_ok()
            {
                return Some(PathBuf::from(path_str));
            }
        }
    }

    None
}
