//! engine-protocol
//!
//! Text encoding/decoding for the matching engine.
//!
//! - [`command_codec`] : command scripts (`<N>`, `o`, places, cancels,
//!   waits, barriers, `x`) into [`ScriptLine`]s
//! - [`output_codec`]  : engine events into output lines

pub mod command_codec;
pub mod output_codec;

pub use command_codec::{Command, ProtocolError, ScriptLine, ScriptParser};
pub use output_codec::{append_event_line, format_event};
