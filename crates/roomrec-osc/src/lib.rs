//! UDP listener for participant events delivered as OSC messages.
//!
//! An alternate producer for environments where the host app exposes
//! an OSC feed instead of (or alongside) its log file. Only two
//! addresses are understood:
//!
//!   /room/participant/joined  s:display_name s:participant_id
//!   /room/participant/left    s:display_name s:participant_id
//!
//! A single string argument is treated as a participant id with no
//! display name. Everything else is ignored.

mod listener;
mod packet;

pub use listener::{OscError, OscListener};
pub use packet::{decode_message, OscMessage};
