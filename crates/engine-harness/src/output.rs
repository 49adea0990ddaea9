//! Event writer task.
//!
//! Drains the engine's event channel and writes one formatted line per
//! event. Events that arrive together are batched into a single write.
//! The task ends when every sender (i.e. the engine) has been dropped.

use engine_core::EventRx;
use engine_protocol::append_event_line;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Upper bound on events folded into one write.
const MAX_BATCH: usize = 1024;

/// Run the writer loop; returns the sink and the number of lines written.
pub async fn run_event_writer<W>(mut events: EventRx, mut out: W) -> std::io::Result<(W, u64)>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    let mut buf = String::with_capacity(64 * MAX_BATCH);

    while let Some(event) = events.recv().await {
        buf.clear();
        append_event_line(&mut buf, &event);
        let mut batch = 1;
        while batch < MAX_BATCH {
            match events.try_recv() {
                Ok(event) => {
                    append_event_line(&mut buf, &event);
                    batch += 1;
                }
                Err(_) => break,
            }
        }

        out.write_all(buf.as_bytes()).await?;
        written += batch as u64;
    }

    out.flush().await?;
    debug!(lines = written, "event writer finished");
    Ok((out, written))
}
