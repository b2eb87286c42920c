pub mod input;
pub mod renderer;
pub mod theme;

use anyhow::Result;
use crossterm::terminal;

/// Keeps the terminal in raw mode for as long as it lives.
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    /// Enter raw mode. With `enable` false this is a no-op guard, for output
    /// that is not a terminal.
    pub fn acquire(enable: bool) -> Result<Self> {
        if enable {
            terminal::enable_raw_mode()?;
        }
        Ok(Self { enabled: enable })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            terminal::disable_raw_mode().ok();
        }
    }
}
