use std::{
    io::{self, BufWriter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender, TrySendError};
use crossterm::event::KeyEvent;
use log::{debug, info, warn};
use ratatui::backend::CrosstermBackend;

use crate::{
    config::AppConfig,
    frame::{build_frame, FrameInput, Freshness, HeaderInfo},
    input::{Command, Dispatcher},
    model::{Change, ChangeSet, Registry},
    poller::{latest_channel, spawn_poller, Backoff, PollCommand, PollReport},
    policy::{SortOrder, Theme},
    render::{RenderError, Renderer, Screen},
    router::{View, ViewState},
    rpc::TransmissionClient,
    term::{spawn_input_thread, TermEvent, TerminalGuard},
};

#[cfg(unix)]
use crate::term::SignalForwarder;

const TICK_RATE: Duration = Duration::from_secs(1);
const CONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

pub fn run(config: AppConfig) -> Result<()> {
    let client = TransmissionClient::new(config.rpc.clone())
        .context("failed to construct Transmission RPC client")?;
    let header = HeaderInfo {
        version: connect_daemon(&client, &config)?,
        endpoint: config.rpc.endpoint(),
    };
    info!(
        "connected to transmission {} at {}",
        header.version, header.endpoint
    );

    let (event_tx, event_rx) = unbounded();
    #[cfg(unix)]
    let signals =
        SignalForwarder::spawn(event_tx.clone()).context("failed to install signal handlers")?;

    let mut guard = TerminalGuard::acquire().context("failed to initialise terminal")?;
    let mut screen = CrosstermBackend::new(BufWriter::new(io::stdout()));

    let (command_tx, command_rx) = bounded(1);
    let (report_tx, report_rx) = latest_channel();
    let backoff = Backoff::new(config.poll_interval, config.poll_backoff_ceiling);
    // Never joined; an in-flight poll is abandoned at quit.
    let _poller = spawn_poller(client, command_rx, report_tx, backoff);

    let stop = Arc::new(AtomicBool::new(false));
    let input_handle = spawn_input_thread(event_tx, Arc::clone(&stop));

    let mut app = App::new(config.theme, header);
    let loop_result = event_loop(&mut app, &mut screen, event_rx, report_rx, &command_tx);

    drop(command_tx);
    stop.store(true, Ordering::Relaxed);
    input_handle.join().ok();
    #[cfg(unix)]
    signals.stop();
    guard.release().context("failed to restore terminal")?;
    info!("shut down");

    loop_result
}

/// Asks the daemon for its version, retrying with backoff. Exhausting the
/// attempts is a startup failure.
fn connect_daemon(client: &TransmissionClient, config: &AppConfig) -> Result<String> {
    let mut backoff = Backoff::new(CONNECT_BASE_DELAY, config.poll_backoff_ceiling);
    let mut attempt = 1;
    loop {
        match client.daemon_version() {
            Ok(version) => return Ok(version),
            Err(err) if attempt >= config.startup_retries => {
                return Err(anyhow!(
                    "daemon at {} unreachable after {attempt} attempts: {err}",
                    config.rpc.endpoint()
                ));
            }
            Err(err) => {
                let delay = backoff.interval();
                warn!("connection attempt {attempt} failed: {err}; retrying in {}s", delay.as_secs());
                backoff.record_failure();
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

fn event_loop<S: Screen>(
    app: &mut App,
    screen: &mut S,
    events: Receiver<TermEvent>,
    reports: Receiver<PollReport>,
    commands: &Sender<PollCommand>,
) -> Result<()> {
    let ticker = tick(TICK_RATE);
    let mut events = events;
    let mut reports = reports;
    app.render(screen, Instant::now())
        .context("failed to draw the first frame")?;

    while !app.is_terminated() {
        select! {
            recv(events) -> event => match event {
                Ok(TermEvent::Key(key)) => app.handle_key(key, Instant::now(), commands),
                Ok(TermEvent::Resize(width, height)) => app.resize(width, height),
                Ok(TermEvent::Terminate(signal)) => {
                    info!("quitting on signal {signal}");
                    app.view.quit();
                }
                Err(_) => {
                    warn!("input thread ended; quitting");
                    events = never();
                    app.view.quit();
                }
            },
            recv(reports) -> report => match report {
                Ok(report) => app.apply_report(report),
                Err(_) => {
                    warn!("poll worker ended; data will no longer refresh");
                    reports = never();
                }
            },
            recv(ticker) -> _ => {}
        }
        app.render(screen, Instant::now())
            .context("terminal output failed")?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct PollFailure {
    error: String,
    failures: u32,
    retry_in: Duration,
}

/// Everything the loop thread owns between iterations.
struct App {
    registry: Registry,
    view: ViewState,
    dispatcher: Dispatcher,
    renderer: Renderer,
    theme: Theme,
    header: HeaderInfo,
    last_update: Option<Instant>,
    failure: Option<PollFailure>,
    page: u16,
}

impl App {
    fn new(theme: Theme, header: HeaderInfo) -> Self {
        Self {
            registry: Registry::new(SortOrder::default()),
            view: ViewState::new(),
            dispatcher: Dispatcher::default(),
            renderer: Renderer::new(),
            theme,
            header,
            last_update: None,
            failure: None,
            page: 1,
        }
    }

    fn is_terminated(&self) -> bool {
        self.view.is_terminated()
    }

    fn freshness(&self, now: Instant) -> Freshness {
        match (&self.failure, self.last_update) {
            (Some(failure), _) => Freshness::Stale {
                error: failure.error.clone(),
                failures: failure.failures,
                retry_in: failure.retry_in,
            },
            (None, Some(at)) => Freshness::Fresh {
                age: now.saturating_duration_since(at),
            },
            (None, None) => Freshness::Waiting,
        }
    }

    fn apply_report(&mut self, report: PollReport) {
        match report.result {
            Ok(records) => {
                let changes = self.registry.apply_snapshot(records);
                log_changes(&changes);
                self.view.reconcile(&self.registry, &changes);
                self.last_update = Some(report.finished_at);
                self.failure = None;
            }
            Err(err) => {
                self.failure = Some(PollFailure {
                    error: err.to_string(),
                    failures: report.consecutive_failures,
                    retry_in: report.retry_in,
                });
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant, commands: &Sender<PollCommand>) {
        let command = self.dispatcher.handle(key, self.view.view(), now);
        if command != Command::Noop {
            debug!("{:?} in {:?}", command, self.view.view());
        }
        let in_list = self.view.view() == View::List;
        let page = self.page as isize;
        match command {
            Command::Up if in_list => {
                self.view.move_selection(-1, &self.registry);
            }
            Command::Down if in_list => {
                self.view.move_selection(1, &self.registry);
            }
            Command::PageUp if in_list => {
                self.view.move_selection(-page, &self.registry);
            }
            Command::PageDown if in_list => {
                self.view.move_selection(page, &self.registry);
            }
            Command::Top if in_list => {
                self.view.select_first(&self.registry);
            }
            Command::Bottom if in_list => {
                self.view.select_last(&self.registry);
            }
            Command::Up => {
                self.view.scroll_by(-1);
            }
            Command::Down => {
                self.view.scroll_by(1);
            }
            Command::PageUp => {
                self.view.scroll_by(-(page as i32));
            }
            Command::PageDown => {
                self.view.scroll_by(page as i32);
            }
            Command::Top => {
                self.view.scroll_to_top();
            }
            Command::Bottom => {
                self.view.scroll_to_bottom();
            }
            Command::Select => {
                self.view.select(&self.registry);
            }
            Command::Back => {
                self.view.back();
            }
            Command::NextTab => {
                self.view.next_tab();
            }
            Command::PreviousTab => {
                self.view.previous_tab();
            }
            Command::Tab(tab) => {
                self.view.switch_tab(tab);
            }
            Command::Raw => {
                self.view.raw();
            }
            Command::Refresh => request_refresh(commands),
            Command::RotateSort => self.set_sort(self.registry.sort_order().rotate()),
            Command::ReverseSort => self.set_sort(self.registry.sort_order().reverse()),
            Command::Quit => self.view.quit(),
            Command::Noop => {}
        }
    }

    fn set_sort(&mut self, order: SortOrder) {
        info!("sorting by {}", order.label());
        self.registry.set_sort(order);
        self.view.reconcile(&self.registry, &ChangeSet::default());
    }

    // A frame already presented at this size needs no second repaint.
    fn resize(&mut self, width: u16, height: u16) {
        info!("terminal resized to {width}x{height}");
        let presented = self
            .renderer
            .last_area()
            .map(|area| (area.width, area.height));
        if presented != Some((width, height)) {
            self.renderer.invalidate();
        }
    }

    fn render<S: Screen>(&mut self, screen: &mut S, now: Instant) -> Result<(), RenderError> {
        let (width, height) = screen.size()?;
        let freshness = self.freshness(now);
        let built = build_frame(
            &FrameInput {
                registry: &self.registry,
                view: &self.view,
                theme: &self.theme,
                header: &self.header,
                freshness: &freshness,
            },
            width,
            height,
        );
        self.view.set_scroll_limit(built.scroll_limit);
        self.page = height.saturating_sub(4).max(1);
        let stats = self.renderer.present(built.buffer, screen)?;
        if stats.cells_written > 0 {
            debug!("rendered {} cells", stats.cells_written);
        }
        Ok(())
    }
}

fn request_refresh(commands: &Sender<PollCommand>) {
    match commands.try_send(PollCommand::Refresh) {
        Ok(()) => debug!("refresh requested"),
        Err(TrySendError::Full(_)) => debug!("refresh already pending"),
        Err(TrySendError::Disconnected(_)) => warn!("poll worker gone; refresh ignored"),
    }
}

fn log_changes(changes: &ChangeSet) {
    if changes.is_quiet() {
        return;
    }
    let (mut inserted, mut updated, mut removed) = (0, 0, 0);
    for (_, change) in &changes.changes {
        match change {
            Change::Inserted => inserted += 1,
            Change::Updated(fields) if !fields.is_empty() => updated += 1,
            Change::Updated(_) => {}
            Change::Removed => removed += 1,
        }
    }
    debug!("snapshot applied: {inserted} new, {updated} changed, {removed} gone");
}
