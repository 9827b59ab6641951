//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Platform terminal mode switching

use std::io;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Switches the local terminal in and out of raw mode
pub trait TerminalDriver: Send + Sync {
    fn enable_raw_mode(&self) -> io::Result<()>;
    fn restore_mode(&self) -> io::Result<()>;
    /// Check if raw mode is currently enabled by this driver
    fn is_raw(&self) -> bool;
}

/// [`TerminalDriver`] backed by crossterm
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermDriver;

impl CrosstermDriver {
    pub fn new() -> Self {
        Self
    }
}

impl TerminalDriver for CrosstermDriver {
    fn enable_raw_mode(&self) -> io::Result<()> {
        install_panic_hook();
        install_termination_hook();
        crossterm::terminal::enable_raw_mode()?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);
        debug!("Terminal switched to raw mode");
        Ok(())
    }

    fn restore_mode(&self) -> io::Result<()> {
        if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
            crossterm::terminal::disable_raw_mode()?;
            debug!("Terminal mode restored");
        }
        Ok(())
    }

    fn is_raw(&self) -> bool {
        RAW_MODE_ACTIVE.load(Ordering::SeqCst)
    }
}

/// Restore the terminal on panic before the previous hook reports it.
fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_restore();
            previous(info);
        }));
    });
}

/// Restore the terminal before a termination signal ends the process.
///
/// Installed once, the first time raw mode is enabled.
#[cfg(unix)]
fn install_termination_hook() {
    use signal_hook::consts::signal::{SIGHUP, SIGQUIT, SIGTERM};
    use signal_hook::iterator::Signals;

    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let mut signals = match Signals::new([SIGTERM, SIGHUP, SIGQUIT]) {
            Ok(signals) => signals,
            Err(error) => {
                warn!(%error, "Unable to watch termination signals");
                return;
            }
        };
        let spawned = std::thread::Builder::new()
            .name("diagnostix-exit-restore".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    warn!(signal, "Termination signal received, restoring terminal");
                    std::process::exit(restore_for_exit(signal));
                }
            });
        if let Err(error) = spawned {
            warn!(%error, "Unable to start termination signal watcher");
        }
    });
}

#[cfg(not(unix))]
fn install_termination_hook() {}

/// Restore the terminal and compute the conventional exit status for `signal`
#[cfg_attr(not(unix), allow(dead_code))]
fn restore_for_exit(signal: i32) -> i32 {
    best_effort_restore();
    128 + signal
}

/// Restore the terminal on exit paths that skip `Drop`, such as
/// `std::process::exit`.
pub fn best_effort_restore() {
    if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Holds raw mode for its lifetime
pub struct RawModeGuard<D: TerminalDriver + ?Sized> {
    driver: std::sync::Arc<D>,
}

impl<D: TerminalDriver + ?Sized> RawModeGuard<D> {
    /// Enable raw mode through `driver`
    pub fn enable(driver: std::sync::Arc<D>) -> io::Result<Self> {
        driver.enable_raw_mode()?;
        Ok(Self { driver })
    }
}

impl<D: TerminalDriver + ?Sized> Drop for RawModeGuard<D> {
    fn drop(&mut self) {
        if let Err(error) = self.driver.restore_mode() {
            warn!(%error, "Failed to restore terminal mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingDriver {
        raw: AtomicBool,
        restores: AtomicUsize,
    }

    impl TerminalDriver for CountingDriver {
        fn enable_raw_mode(&self) -> io::Result<()> {
            self.raw.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn restore_mode(&self) -> io::Result<()> {
            self.raw.store(false, Ordering::SeqCst);
            self.restores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_raw(&self) -> bool {
            self.raw.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let driver = Arc::new(CountingDriver::default());
        {
            let _guard = RawModeGuard::enable(driver.clone()).unwrap();
            assert!(driver.is_raw());
        }
        assert!(!driver.is_raw());
        assert_eq!(driver.restores.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restore_for_exit_clears_raw_flag() {
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);
        assert_eq!(restore_for_exit(15), 143);
        assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
    }

    #[test]
    fn test_restore_without_raw_is_noop() {
        let driver = CrosstermDriver::new();
        assert!(driver.restore_mode().is_ok());
    }
}
