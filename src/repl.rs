//! The interactive read-dispatch loop.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(test)]
use std::collections::VecDeque;

use crate::commands::Session;
use crate::dispatch::{Dispatched, Dispatcher};
use crate::logger::sanitize_log_value;

pub(crate) trait ShellIo {
    fn write_out(&mut self, s: &str) -> io::Result<()>;
    fn write_err(&mut self, s: &str) -> io::Result<()>;
    fn flush_out(&mut self) -> io::Result<()>;
    /// Next input line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;
    fn is_interactive(&self) -> bool;
}

pub(crate) struct TerminalShellIo {
    stdin: io::Stdin,
    stdout: io::Stdout,
    stderr: io::Stderr,
    interactive: bool,
}

impl TerminalShellIo {
    pub(crate) fn new() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            stdin,
            stdout: io::stdout(),
            stderr: io::stderr(),
            interactive,
        }
    }

    pub(crate) fn stdout_is_terminal(&self) -> bool {
        self.stdout.is_terminal()
    }
}

impl ShellIo for TerminalShellIo {
    fn write_out(&mut self, s: &str) -> io::Result<()> {
        self.stdout.lock().write_all(s.as_bytes())
    }

    fn write_err(&mut self, s: &str) -> io::Result<()> {
        self.stderr.lock().write_all(s.as_bytes())
    }

    fn flush_out(&mut self) -> io::Result<()> {
        self.stdout.lock().flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.stdin.lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
pub(crate) struct TestShellIo {
    inputs: VecDeque<String>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

#[cfg(test)]
impl TestShellIo {
    pub(crate) fn new(inputs: Vec<&str>) -> Self {
        Self {
            inputs: inputs.into_iter().map(str::to_string).collect(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[cfg(test)]
impl ShellIo for TestShellIo {
    fn write_out(&mut self, s: &str) -> io::Result<()> {
        self.stdout.push_str(s);
        Ok(())
    }

    fn write_err(&mut self, s: &str) -> io::Result<()> {
        self.stderr.push_str(s);
        Ok(())
    }

    fn flush_out(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.inputs.pop_front())
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

pub(crate) fn prompt(server: &str) -> String {
    let host = server
        .trim_end_matches('/')
        .split_once("://")
        .map(|(_, host)| host)
        .unwrap_or(server);
    format!("{} >>> ", host)
}

/// Splits `name rest...`; a leading `%` is accepted for muscle memory.
pub(crate) fn split_command(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let line = line.strip_prefix('%').unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    })
}

/// Reads and runs commands until `exit`, `quit` or end of input. Command
/// failures are reported and never end the session; only I/O errors on the
/// shell's own streams do.
pub(crate) fn run_shell(
    session: &mut Session<'_>,
    dispatcher: &Dispatcher,
    io: &mut dyn ShellIo,
    interrupted: &AtomicBool,
) -> io::Result<()> {
    let prompt = prompt(session.tracker.server_url());
    loop {
        // The line typed after Ctrl-C is a new command, not the interrupted one.
        if interrupted.swap(false, Ordering::SeqCst) {
            io.write_err("KeyboardInterrupt\n")?;
        }
        if io.is_interactive() {
            io.write_out(&prompt)?;
            io.flush_out()?;
        }
        let Some(line) = io.read_line()? else {
            if io.is_interactive() {
                io.write_out("\n")?;
            }
            break;
        };
        let Some((name, args)) = split_command(&line) else {
            continue;
        };

        match name {
            "exit" | "quit" => break,
            "help" => print_help(dispatcher, io, args)?,
            _ => match dispatcher.dispatch(session, io, name, args) {
                Ok(Dispatched::Unknown) => io.write_err(&format!(
                    "Unknown command: {}. Type `help` for the list of commands.\n",
                    name
                ))?,
                Ok(_) => {}
                Err(err) => {
                    session.logger.log_event(&format!(
                        "cmd error name={} error={}",
                        name,
                        sanitize_log_value(&err.to_string())
                    ));
                    io.write_err(&format!("Error: {}\n", err))?;
                }
            },
        }
    }
    Ok(())
}

fn print_help(dispatcher: &Dispatcher, io: &mut dyn ShellIo, topic: &str) -> io::Result<()> {
    let topic = topic.trim();
    if !topic.is_empty() {
        return match dispatcher.find(topic) {
            Some(spec) => io.write_out(&spec.usage()),
            None => io.write_err(&format!("Unknown command: {}\n", topic)),
        };
    }
    let width = dispatcher
        .commands()
        .map(|spec| spec.name.len())
        .max()
        .unwrap_or(0);
    let mut text = String::from("Commands:\n");
    for spec in dispatcher.commands() {
        text.push_str(&format!("  {:width$}  {}\n", spec.name, spec.about, width = width));
    }
    text.push_str(&format!(
        "  {:width$}  {}\n  {:width$}  {}\n",
        "help",
        "List commands, or `help COMMAND` for its usage.",
        "exit",
        "Leave the shell (also `quit` or Ctrl-D).",
        width = width
    ));
    io.write_out(&text)
}
