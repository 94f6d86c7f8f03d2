//! Module `protocol::commands`
//!
//! Defines the client command set and its parsing logic.

/// A command parsed from one client line.
///
/// Anything that is not an exact command token is relayed as a chat message;
/// there are no protocol violations to detect.
#[derive(Debug, PartialEq)]
pub enum Command<'a> {
    /// Leave the chat (`!quit`).
    Quit,
    /// Request the roster of online clients (`!list`).
    List,
    /// A plain chat line to relay to everyone else.
    Message(&'a str),
}

/// Parses one line (already stripped of its trailing newline) into a
/// [`Command`]. Command tokens must match exactly; no leading or trailing
/// whitespace is tolerated, matching the wire protocol.
pub fn parse_command(line: &str) -> Command<'_> {
    match line {
        "!quit" => Command::Quit,
        "!list" => Command::List,
        _ => Command::Message(line),
    }
}
