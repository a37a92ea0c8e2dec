use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    buffer::Cell,
};
#[cfg(unix)]
use signal_hook::{
    consts::{SIGHUP, SIGINT, SIGTERM},
    iterator::{Handle, Signals},
};

use crate::render::Screen;

/// Raw mode plus alternate screen, released exactly once.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn acquire() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(err) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(err);
        }
        Ok(Self { active: true })
    }

    pub fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let raw = disable_raw_mode();
        execute!(io::stdout(), Show, LeaveAlternateScreen)?;
        raw
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("failed to restore terminal: {err}");
        }
    }
}

// The backend skips cursor moves and style changes that repeat within one `draw`.
impl<W: Write> Screen for CrosstermBackend<W> {
    fn size(&self) -> io::Result<(u16, u16)> {
        let area = Backend::size(self)?;
        Ok((area.width, area.height))
    }

    fn clear(&mut self) -> io::Result<()> {
        Backend::clear(self)
    }

    fn draw(&mut self, cells: &[(u16, u16, &Cell)]) -> io::Result<()> {
        Backend::draw(self, cells.iter().map(|(x, y, cell)| (*x, *y, *cell)))
    }

    fn flush(&mut self) -> io::Result<()> {
        Backend::flush(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// A termination signal, by number.
    Terminate(i32),
}

/// Forwards key and resize events until `stop` is set or the receiver is gone.
pub fn spawn_input_thread(tx: Sender<TermEvent>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let tick_rate = Duration::from_millis(250);
        while !stop.load(Ordering::Relaxed) {
            match event::poll(tick_rate) {
                Ok(true) => {
                    let forwarded = match event::read() {
                        Ok(Event::Key(key)) => Some(TermEvent::Key(key)),
                        Ok(Event::Resize(width, height)) => Some(TermEvent::Resize(width, height)),
                        Ok(_) => None,
                        Err(err) => {
                            debug!("ignoring unreadable input event: {err}");
                            None
                        }
                    };
                    if let Some(event) = forwarded {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    debug!("input poll failed: {err}");
                    thread::sleep(tick_rate);
                }
            }
        }
        debug!("input thread stopped");
    })
}

/// Turns termination signals into `TermEvent::Terminate` so the event loop
/// shuts down through the same path as a quit key.
#[cfg(unix)]
pub struct SignalForwarder {
    handle: Handle,
    thread: thread::JoinHandle<()>,
}

#[cfg(unix)]
impl SignalForwarder {
    pub fn spawn(tx: Sender<TermEvent>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
        let handle = signals.handle();
        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                info!("received signal {signal}");
                if tx.send(TermEvent::Terminate(signal)).is_err() {
                    break;
                }
            }
            debug!("signal thread stopped");
        });
        Ok(Self { handle, thread })
    }

    pub fn stop(self) {
        self.handle.close();
        self.thread.join().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Style};

    fn cell(symbol: &str, style: Style) -> Cell {
        let mut cell = Cell::default();
        cell.set_symbol(symbol).set_style(style);
        cell
    }

    #[test]
    fn test_adjacent_cells_share_one_cursor_move() {
        let a = cell("a", Style::default().fg(Color::Green));
        let b = cell("b", Style::default().fg(Color::Green));
        let mut out = Vec::new();
        {
            let mut backend = CrosstermBackend::new(&mut out);
            Screen::draw(&mut backend, &[(0, 0, &a), (1, 0, &b)]).unwrap();
            Screen::flush(&mut backend).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("\u{1b}[1;1H").count(), 1);
        assert!(text.contains("ab"));
    }

    #[test]
    fn test_gaps_between_cells_move_the_cursor() {
        let a = cell("a", Style::default());
        let mut out = Vec::new();
        {
            let mut backend = CrosstermBackend::new(&mut out);
            Screen::draw(&mut backend, &[(0, 0, &a), (4, 2, &a)]).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\u{1b}[3;5H"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sigterm_becomes_terminate_event() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let forwarder = SignalForwarder::spawn(tx).unwrap();
        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(TermEvent::Terminate(SIGTERM))
        );
        forwarder.stop();
    }
}
