// crates/engine-protocol/src/output_codec.rs

//! Output line formatter.
//!
//! One line per [`EngineEvent`], space separated, timestamp last:
//!
//! - Added:    `B|S <id> <instrument> <price> <remaining_qty> <ts>`
//! - Executed: `E <resting_id> <incoming_id> <execution_id> <price> <qty> <ts>`
//! - Deleted:  `X <id> A|R <ts>`

use std::fmt::Write;

use engine_core::EngineEvent;

/// Format an `EngineEvent` as an output line (no trailing newline).
pub fn format_event(event: &EngineEvent) -> String {
    let mut line = String::with_capacity(48);
    write_event(&mut line, event);
    line
}

/// Append the line for `event` plus `\n` to `buf`.
pub fn append_event_line(buf: &mut String, event: &EngineEvent) {
    write_event(buf, event);
    buf.push('\n');
}

fn write_event(buf: &mut String, event: &EngineEvent) {
    // Writing into a String cannot fail.
    let _ = match event {
        EngineEvent::OrderAdded(a) => write!(
            buf,
            "{} {} {} {} {} {}",
            a.side.as_char(),
            a.id,
            a.instrument,
            a.price,
            a.quantity,
            a.timestamp_ns
        ),
        EngineEvent::OrderExecuted(t) => write!(
            buf,
            "E {} {} {} {} {} {}",
            t.resting_id, t.incoming_id, t.execution_id, t.price, t.quantity, t.timestamp_ns
        ),
        EngineEvent::OrderDeleted(d) => write!(
            buf,
            "X {} {} {}",
            d.id,
            if d.accepted { 'A' } else { 'R' },
            d.timestamp_ns
        ),
    };
}
