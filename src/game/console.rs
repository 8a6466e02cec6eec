//! Line-oriented game server adapter.
//!
//! The host process writes one JSON object per line:
//!
//! ```text
//! {"type":"chat","player":"Amy","message":"hi"}
//! {"type":"join","player":"Amy"}
//! {"type":"leave","player":"Amy"}
//! {"type":"death","player":"Amy","death_message":"Amy fell from a high place"}
//! {"type":"reload"}
//! ```
//!
//! and reads broadcasts back as `{"type":"broadcast","line":"..."}`.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::common::{EventHub, GameEvent};
use crate::game::GameServer;

/// Longest accepted input line, in bytes.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A line from the host.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ConsoleInput {
    Chat { player: String, message: String },
    Join { player: String },
    Leave { player: String },
    Death { player: String, death_message: String },
    Reload,
}

/// A line to the host.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ConsoleOutput<'a> {
    Broadcast { line: &'a str },
}

/// Game server reached over a pair of byte streams (stdin/stdout in
/// production).
pub struct ConsoleServer {
    events: EventHub<GameEvent>,
    output_tx: mpsc::UnboundedSender<String>,
}

/// Background tasks and signals of a running console.
pub struct ConsoleTasks {
    /// Fires once per `reload` line.
    pub reload_rx: mpsc::UnboundedReceiver<()>,
    /// Ends when the host closes its side.
    pub reader: JoinHandle<()>,
}

impl ConsoleServer {
    /// Start reading events from `input` and writing broadcasts to `output`.
    pub fn spawn<R, W>(input: R, output: W) -> (Arc<Self>, ConsoleTasks)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();

        let server = Arc::new(Self {
            events: EventHub::new(),
            output_tx,
        });

        let reader = tokio::spawn(read_loop(Arc::clone(&server), input, reload_tx));
        // The writer runs until every broadcast sender is gone.
        tokio::spawn(write_loop(output, output_rx));

        (
            server,
            ConsoleTasks {
                reload_rx,
                reader,
            },
        )
    }

    fn handle_line(&self, line: &str, reload_tx: &mpsc::UnboundedSender<()>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let input = match serde_json::from_str::<ConsoleInput>(line) {
            Ok(input) => input,
            Err(e) => {
                warn!("Ignoring malformed console line: {} ({})", line, e);
                return;
            }
        };

        let event = match input {
            ConsoleInput::Chat { player, message } => GameEvent::Chat { player, message },
            ConsoleInput::Join { player } => GameEvent::Joined { player },
            ConsoleInput::Leave { player } => GameEvent::Left { player },
            ConsoleInput::Death {
                player,
                death_message,
            } => GameEvent::Died {
                player,
                death_message,
            },
            ConsoleInput::Reload => {
                if reload_tx.send(()).is_err() {
                    debug!("Reload requested but nobody is listening");
                }
                return;
            }
        };

        if !self.events.publish(event) {
            debug!("Dropping game event - no subscriber");
        }
    }
}

impl GameServer for ConsoleServer {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<GameEvent> {
        self.events.subscribe()
    }

    fn unsubscribe(&self) {
        self.events.unsubscribe();
    }

    fn broadcast(&self, line: &str) {
        let encoded = match serde_json::to_string(&ConsoleOutput::Broadcast { line }) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode broadcast: {}", e);
                return;
            }
        };
        if self.output_tx.send(encoded).is_err() {
            warn!("Console output closed, broadcast dropped");
        }
    }
}

async fn read_loop<R>(server: Arc<ConsoleServer>, input: R, reload_tx: mpsc::UnboundedSender<()>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => server.handle_line(&line, &reload_tx),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("Ignoring console line longer than {} bytes", MAX_LINE_LENGTH);
            }
            Err(LinesCodecError::Io(e)) => {
                error!("Console read error: {}", e);
                break;
            }
        }
    }

    info!("Game console input closed");
}

async fn write_loop<W>(output: W, mut output_rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(output, LinesCodec::new());

    while let Some(line) = output_rx.recv().await {
        if let Err(e) = sink.send(line).await {
            error!("Console write error: {}", e);
            break;
        }
    }

    debug!("Game console output closed");
}
