use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::calibration::command::Command;
use crate::preview::{CalibrationView, SessionView};
use crate::utils::error::Result;

/// Declarative key table; the session logic never sees raw key codes.
const KEY_BINDINGS: &[(char, Command)] = &[
    ('a', Command::ShiftXNeg),
    ('d', Command::ShiftXPos),
    ('w', Command::ShiftYNeg),
    ('s', Command::ShiftYPos),
    ('j', Command::LeftStartBack),
    ('k', Command::LeftStartForward),
    ('n', Command::RightStartBack),
    ('m', Command::RightStartForward),
    (',', Command::SeekBack),
    ('.', Command::SeekForward),
    ('u', Command::RotateGlobalNeg),
    ('i', Command::RotateGlobalPos),
    ('o', Command::RotateLocalNeg),
    ('p', Command::RotateLocalPos),
    (' ', Command::ToggleAnaglyph),
    ('g', Command::ToggleGrid),
    ('r', Command::Reset),
];

fn map_key(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Enter => Some(Command::NextPair),
        KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(Command::Quit),
        KeyCode::Char(c) => KEY_BINDINGS
            .iter()
            .find(|(key, _)| *key == c.to_ascii_lowercase())
            .map(|(_, command)| *command),
        _ => None,
    }
}

/// Keyboard-driven view: prints one status line per iteration and blocks in
/// raw mode for a single keypress. Raw mode is held only while waiting, so
/// log output between pairs renders normally.
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        println!("Keys: a/d shift x, w/s shift y, j/k left start, n/m right start, ,/. seek");
        println!("      u/i horizon rotate, o/p eye rotate, space anaglyph, g grid, r reset");
        println!("      Enter next pair, q or Esc quit without saving");
        Self
    }

    fn read_command(&self) -> Result<Command> {
        let _raw = RawModeGuard::engage()?;
        loop {
            if let Event::Key(key) = event::read()? {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    return Ok(Command::Quit);
                }
                if let Some(command) = map_key(key.code) {
                    return Ok(command);
                }
                // Unmapped keys are ignored; keep waiting.
            }
        }
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationView for TerminalView {
    fn present(&mut self, view: &SessionView<'_>) -> Result<Command> {
        println!("{}", status_line(view));
        io::stdout().flush()?;
        self.read_command()
    }
}

fn status_line(view: &SessionView<'_>) -> String {
    let state = view.state;
    format!(
        "[{}/{}] {} + {} | start L {} R {} | seek {}/{} | x {:+} y {:+} | rot g {:+.1} l {:+.1} | {} | grid {}",
        view.pair_index,
        view.pair_count,
        view.left_name,
        view.right_name,
        state.start_frame_left(),
        state.start_frame_right(),
        state.seek(),
        view.bounds.max_frames(),
        state.x_offset(),
        state.y_offset(),
        state.rotation_global(),
        state.rotation_local(),
        if view.display.anaglyph {
            "anaglyph"
        } else {
            "side-by-side"
        },
        if view.display.show_grid { "on" } else { "off" }
    )
}

struct RawModeGuard;

impl RawModeGuard {
    fn engage() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
