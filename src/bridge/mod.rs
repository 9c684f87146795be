//! Line-oriented bridge that drives a session from stdin/stdout.

pub mod echo;
pub mod stdio;

pub use echo::demo_roster;
pub use stdio::{BridgeCommand, BridgeInput, parse_line, run_stdio_bridge};
