//! Stdio bus adapter
//!
//! One JSON record per line: stdin lines become command events, and
//! notification and settings events are written to stdout.

use bus_runtime::{Event, EventPublisher};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const STDIO_SOURCE: &str = "stdio";

/// Publish every JSON line read from `reader` on `topic`
pub async fn pump_commands<R>(reader: R, bus: EventPublisher, topic: String) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(payload) => {
                if bus.emit(topic.as_str(), STDIO_SOURCE, payload).is_err() {
                    warn!("Command dropped; bus has no subscribers");
                }
            }
            Err(e) => warn!(error = %e, "Dropping malformed command record"),
        }
    }
    debug!("Command input closed");
    Ok(())
}

/// Write the payload of every event matching `topics` to `writer`
pub async fn pump_events<W>(
    mut events: broadcast::Receiver<Event>,
    mut writer: W,
    topics: Vec<String>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Output lagged behind the bus");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !topics.iter().any(|topic| event.matches(topic)) {
            continue;
        }
        let mut line = serde_json::to_vec(&event.payload).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Reader and writer tasks bound to the process's stdin and stdout
pub struct StdioBus {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StdioBus {
    /// The event subscription is taken before returning, so nothing published
    /// afterwards is missed.
    pub fn spawn(bus: EventPublisher, command_topic: String, output_topics: Vec<String>) -> Self {
        let events = bus.subscribe();
        info!(command_topic = %command_topic, outputs = ?output_topics, "Stdio bus attached");

        let reader = tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = pump_commands(stdin, bus, command_topic).await {
                warn!(error = %e, "Stdin reader failed");
            }
        });
        let writer = tokio::spawn(async move {
            if let Err(e) = pump_events(events, tokio::io::stdout(), output_topics).await {
                warn!(error = %e, "Stdout writer failed");
            }
        });

        Self { reader, writer }
    }

    pub fn shutdown(self) {
        self.reader.abort();
        self.writer.abort();
    }
}
