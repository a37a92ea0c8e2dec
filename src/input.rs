use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::router::{DetailTab, View};

const QUIT_PRESSES: usize = 5;
const QUIT_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Select,
    Back,
    NextTab,
    PreviousTab,
    Tab(DetailTab),
    Raw,
    Refresh,
    RotateSort,
    ReverseSort,
    Quit,
    Noop,
}

/// Maps a key to a command for the given view. Keys without a meaning in
/// that view map to `Command::Noop`.
pub fn dispatch(key: KeyEvent, view: View) -> Command {
    if key.kind != KeyEventKind::Press {
        return Command::Noop;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Command::Quit,
            _ => Command::Noop,
        };
    }
    if view == View::Terminated {
        return Command::Noop;
    }

    let shared = match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Command::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Command::Up),
        KeyCode::PageDown => Some(Command::PageDown),
        KeyCode::PageUp => Some(Command::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Command::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Command::Bottom),
        KeyCode::Char('R') => Some(Command::Refresh),
        _ => None,
    };
    if let Some(command) = shared {
        return command;
    }

    match view {
        View::List => match key.code {
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => Command::Select,
            KeyCode::Char('q') => Command::Quit,
            KeyCode::Char('s') => Command::RotateSort,
            KeyCode::Char('S') => Command::ReverseSort,
            _ => Command::Noop,
        },
        View::Detail(_) => match key.code {
            KeyCode::Esc
            | KeyCode::Char('h')
            | KeyCode::Left
            | KeyCode::Backspace
            | KeyCode::Char('q') => Command::Back,
            KeyCode::Tab => Command::NextTab,
            KeyCode::BackTab => Command::PreviousTab,
            KeyCode::Char('r') => Command::Raw,
            KeyCode::Char(c) => DetailTab::ALL
                .into_iter()
                .find(|tab| tab.hotkey() == c)
                .map_or(Command::Noop, Command::Tab),
            _ => Command::Noop,
        },
        View::RawJson => match key.code {
            KeyCode::Esc
            | KeyCode::Char('h')
            | KeyCode::Left
            | KeyCode::Backspace
            | KeyCode::Char('q') => Command::Back,
            _ => Command::Noop,
        },
        View::Terminated => Command::Noop,
    }
}

/// Counts `q` presses inside a sliding window.
#[derive(Debug, Default)]
pub struct QuitTracker {
    presses: VecDeque<Instant>,
}

impl QuitTracker {
    /// Records a press and returns true once enough presses landed in the window.
    pub fn press(&mut self, now: Instant) -> bool {
        while let Some(first) = self.presses.front() {
            if now.saturating_duration_since(*first) >= QUIT_WINDOW {
                self.presses.pop_front();
            } else {
                break;
            }
        }
        self.presses.push_back(now);
        self.presses.len() >= QUIT_PRESSES
    }
}

/// Key dispatch plus the view-independent `q` escape hatch.
#[derive(Debug, Default)]
pub struct Dispatcher {
    quit: QuitTracker,
}

impl Dispatcher {
    pub fn handle(&mut self, key: KeyEvent, view: View, now: Instant) -> Command {
        let command = dispatch(key, view);
        let plain_q = key.kind == KeyEventKind::Press
            && key.code == KeyCode::Char('q')
            && !key.modifiers.contains(KeyModifiers::CONTROL);
        if plain_q && self.quit.press(now) {
            return Command::Quit;
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    const VIEWS: [View; 3] = [View::List, View::Detail(DetailTab::Overview), View::RawJson];

    #[test]
    fn test_list_keys() {
        assert_eq!(dispatch(key(KeyCode::Char('j')), View::List), Command::Down);
        assert_eq!(dispatch(key(KeyCode::Up), View::List), Command::Up);
        assert_eq!(dispatch(key(KeyCode::Enter), View::List), Command::Select);
        assert_eq!(dispatch(key(KeyCode::Char('q')), View::List), Command::Quit);
        assert_eq!(dispatch(key(KeyCode::Char('s')), View::List), Command::RotateSort);
        assert_eq!(dispatch(key(KeyCode::Char('S')), View::List), Command::ReverseSort);
        assert_eq!(dispatch(key(KeyCode::Esc), View::List), Command::Noop);
        assert_eq!(dispatch(key(KeyCode::Tab), View::List), Command::Noop);
    }

    #[test]
    fn test_detail_keys() {
        let view = View::Detail(DetailTab::Overview);
        assert_eq!(dispatch(key(KeyCode::Esc), view), Command::Back);
        assert_eq!(dispatch(key(KeyCode::Char('q')), view), Command::Back);
        assert_eq!(dispatch(key(KeyCode::Tab), view), Command::NextTab);
        assert_eq!(dispatch(key(KeyCode::BackTab), view), Command::PreviousTab);
        assert_eq!(dispatch(key(KeyCode::Char('r')), view), Command::Raw);
        assert_eq!(
            dispatch(key(KeyCode::Char('t')), view),
            Command::Tab(DetailTab::Trackers)
        );
        assert_eq!(dispatch(key(KeyCode::Char('e')), view), Command::Tab(DetailTab::Peers));
        assert_eq!(dispatch(key(KeyCode::Char('s')), view), Command::Noop);
        assert_eq!(dispatch(key(KeyCode::Char('j')), view), Command::Down);
    }

    #[test]
    fn test_raw_keys() {
        assert_eq!(dispatch(key(KeyCode::Backspace), View::RawJson), Command::Back);
        assert_eq!(dispatch(key(KeyCode::Char('r')), View::RawJson), Command::Noop);
        assert_eq!(dispatch(key(KeyCode::End), View::RawJson), Command::Bottom);
    }

    #[test]
    fn test_refresh_and_ctrl_c_everywhere() {
        for view in VIEWS {
            assert_eq!(dispatch(key(KeyCode::Char('R')), view), Command::Refresh);
            let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
            assert_eq!(dispatch(ctrl_c, view), Command::Quit);
        }
    }

    #[test]
    fn test_unknown_keys_are_noops() {
        for view in VIEWS {
            for code in [KeyCode::F(5), KeyCode::Char('z'), KeyCode::Insert, KeyCode::Null] {
                assert_eq!(dispatch(key(code), view), Command::Noop);
            }
        }
    }

    #[test]
    fn test_release_events_ignored() {
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(dispatch(release, View::List), Command::Noop);
    }

    #[test]
    fn test_five_q_presses_quit_from_raw() {
        let mut dispatcher = Dispatcher::default();
        let start = Instant::now();
        let q = key(KeyCode::Char('q'));
        for i in 0..4 {
            let now = start + Duration::from_millis(500 * i);
            assert_eq!(dispatcher.handle(q, View::RawJson, now), Command::Back);
        }
        assert_eq!(
            dispatcher.handle(q, View::RawJson, start + Duration::from_secs(2)),
            Command::Quit
        );
    }

    #[test]
    fn test_slow_q_presses_do_not_quit() {
        let mut tracker = QuitTracker::default();
        let start = Instant::now();
        for i in 0..10 {
            assert!(!tracker.press(start + Duration::from_secs(2 * i)));
        }
    }
}
