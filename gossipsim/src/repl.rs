//! Text command adapter.
//!
//! Reads whitespace-separated tokens from the input, drives the simulator,
//! and writes every reply to the output sink so whole sessions can be
//! captured and compared byte for byte.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use thiserror::Error;

use gossipnet::Duration;

use crate::dot::render_dot;
use crate::sim::Simulator;

/// A parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create N nodes.
    Add(usize),
    /// Remove N random nodes.
    Del(usize),
    /// Advance virtual time by up to T microseconds.
    Wait(Duration),
    /// Emit the overlay as a DOT graph.
    Print,
    /// Terminate the session.
    Quit,
}

/// A token the parser could not make sense of. Rendering matches the reply
/// the session prints before carrying on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command {token}")]
pub struct CommandError {
    pub token: String,
}

/// Pull whitespace-separated tokens out of a line-based reader.
struct Tokens<R> {
    input: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            pending: VecDeque::new(),
        }
    }

    fn next(&mut self) -> io::Result<Option<String>> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_owned));
        }
        Ok(self.pending.pop_front())
    }
}

/// Parse one command starting at `token`; `next` supplies argument tokens.
/// Input running dry mid-command quits, like a plain end of input does.
fn parse_command(
    token: &str,
    next: &mut dyn FnMut() -> io::Result<Option<String>>,
) -> io::Result<Result<Command, CommandError>> {
    let mut count_arg = |make: fn(u64) -> Command| -> io::Result<Result<Command, CommandError>> {
        match next()? {
            None => Ok(Ok(Command::Quit)),
            Some(arg) => Ok(arg
                .parse::<u64>()
                .map(make)
                .map_err(|_| CommandError { token: arg })),
        }
    };
    match token {
        "end" | "exit" => Ok(Ok(Command::Quit)),
        "print" => Ok(Ok(Command::Print)),
        "add" => count_arg(|n| Command::Add(n as usize)),
        "del" => count_arg(|n| Command::Del(n as usize)),
        "wait" => count_arg(|n| Command::Wait(Duration::from_micros(n))),
        other => Ok(Err(CommandError {
            token: other.to_owned(),
        })),
    }
}

/// Run a command session until `end`, `exit`, or end of input.
pub fn run(sim: &mut Simulator, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    let mut tokens = Tokens::new(input);
    while let Some(token) = tokens.next()? {
        let parsed = parse_command(&token, &mut || tokens.next())?;
        match parsed {
            Ok(Command::Quit) => break,
            Ok(Command::Add(n)) => sim.add_nodes(n),
            Ok(Command::Del(n)) => sim.del_nodes(n),
            Ok(Command::Wait(span)) => sim.wait(span, out)?,
            Ok(Command::Print) => render_dot(sim.cluster(), out)?,
            Err(err) => writeln!(out, "{}", err)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session(script: &str) -> String {
        let mut sim = Simulator::new(7);
        let mut out = Vec::new();
        run(&mut sim, Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unknown_command_is_reported() {
        assert_eq!(session("bogus end"), "unknown command bogus\n");
    }

    #[test]
    fn test_bad_count_is_reported() {
        assert_eq!(session("add few\nend\n"), "unknown command few\n");
    }

    #[test]
    fn test_wait_without_work() {
        assert_eq!(session("wait 1000\nexit\n"), "No more to do\n");
    }

    #[test]
    fn test_tokens_span_lines() {
        // Commands and arguments may be split across lines arbitrarily.
        assert_eq!(session("wait\n1000\nend"), "No more to do\n");
    }

    #[test]
    fn test_print_on_empty_cluster() {
        let text = session("print end");
        assert!(text.starts_with("graph G {"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn test_input_exhaustion_quits() {
        // A command missing its argument at end of input just terminates.
        assert_eq!(session("add"), "");
        assert_eq!(session(""), "");
    }

    #[test]
    fn test_add_and_del_roundtrip() {
        let mut sim = Simulator::new(8);
        let mut out = Vec::new();
        run(&mut sim, Cursor::new("add 4 del 1 end"), &mut out).unwrap();
        assert_eq!(sim.cluster().len(), 3);
        assert_eq!(out, b"");
    }
}
