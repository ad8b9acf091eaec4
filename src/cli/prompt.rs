use std::io::{self, BufRead, IsTerminal, Write};

use colored::{control, Colorize};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::core::auth::{CredentialError, SecretPrompt};

/// Restores cooked mode even when input handling bails out early.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Masked token entry on the controlling terminal.
///
/// When stdin is not a terminal (piped input) one line is read per question,
/// so `echo $TOKEN | cwatch auth login` works.
pub struct TerminalPrompt {
    use_color: bool,
}

impl TerminalPrompt {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }
}

impl SecretPrompt for TerminalPrompt {
    fn ask(&self, title: &str, hint: &str) -> Result<Option<String>, CredentialError> {
        control::set_override(self.use_color);
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|e| CredentialError::Prompt(e.to_string()))?;
            return Ok((read > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string()));
        }

        eprintln!("{}", hint.dimmed());
        eprint!("{}: ", title.cyan());
        let _ = io::stderr().flush();
        let answer = read_masked().map_err(|e| CredentialError::Prompt(e.to_string()));
        eprint!("\r\n");
        answer
    }

    fn reject(&self, reason: &str) {
        control::set_override(self.use_color);
        eprintln!("{}", reason.red());
    }
}

/// Read one line without echoing it. `None` on Esc or Ctrl-C.
fn read_masked() -> io::Result<Option<String>> {
    let _guard = RawModeGuard::enable()?;
    let mut input = String::new();

    loop {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        {
            if kind == KeyEventKind::Release {
                continue;
            }
            match (code, modifiers) {
                (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                    return Ok(None);
                }
                (KeyCode::Enter, _) => return Ok(Some(input)),
                (KeyCode::Backspace, _) => {
                    if input.pop().is_some() {
                        eprint!("\x08 \x08");
                    }
                }
                (KeyCode::Char(c), _) => {
                    input.push(c);
                    eprint!("*");
                }
                _ => {}
            }
            let _ = io::stderr().flush();
        }
    }
}
