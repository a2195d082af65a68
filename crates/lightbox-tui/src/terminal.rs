use std::io::{self, Write};

use crossterm::{
    cursor, execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};

/// Raw mode plus the alternate screen, undone on drop. Whatever part of the
/// setup succeeded is restored, including when a later step fails.
pub struct TerminalGuard<W: Write> {
    out: W,
    raw: bool,
    alternate: bool,
}

impl<W: Write> TerminalGuard<W> {
    pub fn enter(out: W) -> io::Result<Self> {
        enable_raw_mode()?;
        Self {
            out,
            raw: true,
            alternate: false,
        }
        .with_alternate_screen()
    }

    fn with_alternate_screen(mut self) -> io::Result<Self> {
        execute!(self.out, EnterAlternateScreen)?;
        self.alternate = true;
        Ok(self)
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        if self.alternate {
            let _ = execute!(self.out, LeaveAlternateScreen, cursor::Show);
        }
        if self.raw {
            let _ = disable_raw_mode();
        }
    }
}
