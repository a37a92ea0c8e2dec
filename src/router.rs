use log::debug;

use crate::model::{ChangeSet, Registry, TorrentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailTab {
    #[default]
    Overview,
    Files,
    Peers,
    Trackers,
    Chunks,
}

impl DetailTab {
    pub const ALL: [DetailTab; 5] = [
        DetailTab::Overview,
        DetailTab::Files,
        DetailTab::Peers,
        DetailTab::Trackers,
        DetailTab::Chunks,
    ];

    fn index(self) -> usize {
        match self {
            DetailTab::Overview => 0,
            DetailTab::Files => 1,
            DetailTab::Peers => 2,
            DetailTab::Trackers => 3,
            DetailTab::Chunks => 4,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            DetailTab::Overview => "Overview",
            DetailTab::Files => "Files",
            DetailTab::Peers => "Peers",
            DetailTab::Trackers => "Trackers",
            DetailTab::Chunks => "Chunks",
        }
    }

    /// The key that jumps straight to this tab; always a char of the label.
    pub fn hotkey(self) -> char {
        match self {
            DetailTab::Overview => 'o',
            DetailTab::Files => 'f',
            DetailTab::Peers => 'e',
            DetailTab::Trackers => 't',
            DetailTab::Chunks => 'c',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail(DetailTab),
    RawJson,
    Terminated,
}

/// Which view is showing, which torrent it is about, and how far the
/// detail/raw pane is scrolled.
#[derive(Debug, Clone)]
pub struct ViewState {
    view: View,
    selected: Option<TorrentId>,
    selected_row: usize,
    scroll: u16,
    scroll_limit: u16,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            view: View::List,
            selected: None,
            selected_row: 0,
            scroll: 0,
            scroll_limit: 0,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn selected(&self) -> Option<TorrentId> {
        self.selected
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn is_terminated(&self) -> bool {
        self.view == View::Terminated
    }

    fn go(&mut self, next: View) {
        if self.view != next {
            debug!("view {:?} -> {:?}", self.view, next);
        }
        self.view = next;
        self.scroll = 0;
    }

    /// Opens the overview of the highlighted torrent.
    pub fn select(&mut self, registry: &Registry) -> bool {
        match (self.view, self.selected) {
            (View::List, Some(id)) if registry.contains(id) => {
                self.go(View::Detail(DetailTab::Overview));
                true
            }
            _ => false,
        }
    }

    pub fn switch_tab(&mut self, tab: DetailTab) -> bool {
        match self.view {
            View::Detail(current) if current != tab => {
                self.go(View::Detail(tab));
                true
            }
            _ => false,
        }
    }

    pub fn next_tab(&mut self) -> bool {
        match self.view {
            View::Detail(tab) => self.switch_tab(tab.next()),
            _ => false,
        }
    }

    pub fn previous_tab(&mut self) -> bool {
        match self.view {
            View::Detail(tab) => self.switch_tab(tab.previous()),
            _ => false,
        }
    }

    pub fn raw(&mut self) -> bool {
        match self.view {
            View::Detail(_) => {
                self.go(View::RawJson);
                true
            }
            _ => false,
        }
    }

    /// One level up: raw returns to the overview, detail returns to the list.
    pub fn back(&mut self) -> bool {
        match self.view {
            View::RawJson => {
                self.go(View::Detail(DetailTab::Overview));
                true
            }
            View::Detail(_) => {
                self.go(View::List);
                true
            }
            View::List | View::Terminated => false,
        }
    }

    pub fn quit(&mut self) {
        self.go(View::Terminated);
    }

    /// Moves the list highlight by `delta` rows, clamped to the list.
    pub fn move_selection(&mut self, delta: isize, registry: &Registry) -> bool {
        if self.view != View::List || registry.is_empty() {
            return false;
        }
        let order = registry.order();
        let next = match self.selected.and_then(|id| registry.position(id)) {
            Some(current) => {
                let max_index = order.len() as isize - 1;
                (current as isize + delta).clamp(0, max_index) as usize
            }
            None => 0,
        };
        self.set_selection(order.get(next).copied(), next)
    }

    pub fn select_first(&mut self, registry: &Registry) -> bool {
        if self.view != View::List {
            return false;
        }
        self.set_selection(registry.order().first().copied(), 0)
    }

    pub fn select_last(&mut self, registry: &Registry) -> bool {
        if self.view != View::List {
            return false;
        }
        let last = registry.len().saturating_sub(1);
        self.set_selection(registry.order().last().copied(), last)
    }

    fn set_selection(&mut self, id: Option<TorrentId>, row: usize) -> bool {
        let changed = self.selected != id;
        self.selected = id;
        self.selected_row = row;
        changed
    }

    pub fn scroll_by(&mut self, delta: i32) -> bool {
        if !matches!(self.view, View::Detail(_) | View::RawJson) {
            return false;
        }
        let next = (self.scroll as i32 + delta).clamp(0, self.scroll_limit as i32) as u16;
        let changed = next != self.scroll;
        self.scroll = next;
        changed
    }

    pub fn scroll_to_top(&mut self) -> bool {
        self.scroll_by(-(self.scroll as i32))
    }

    pub fn scroll_to_bottom(&mut self) -> bool {
        self.scroll_by(self.scroll_limit as i32)
    }

    /// Records how far the current pane can scroll; called by the renderer.
    pub fn set_scroll_limit(&mut self, limit: u16) {
        self.scroll_limit = limit;
        self.scroll = self.scroll.min(limit);
    }

    /// Brings the selection back in line with a freshly applied snapshot.
    pub fn reconcile(&mut self, registry: &Registry, changes: &ChangeSet) {
        if let Some(id) = self.selected {
            if changes.is_removed(id) || !registry.contains(id) {
                if matches!(self.view, View::Detail(_) | View::RawJson) {
                    debug!("torrent {id} vanished while open; returning to list");
                    self.go(View::List);
                    self.selected = None;
                    self.selected_row = 0;
                    return;
                }
                let row = self.selected_row.min(registry.len().saturating_sub(1));
                self.set_selection(registry.order().get(row).copied(), row);
                return;
            }
        }
        match self.selected {
            Some(id) => {
                if let Some(row) = registry.position(id) {
                    self.selected_row = row;
                }
            }
            None if self.view == View::List => {
                self.set_selection(registry.order().first().copied(), 0);
            }
            None => {}
        }
    }
}
