use std::time::Duration;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::{
    model::{
        format_bytes, format_count, format_eta, format_progress, format_ratio, format_speed,
        FileStat, Registry, Section, TorrentEntry,
    },
    policy::Theme,
    router::{DetailTab, View, ViewState},
};

const ELLIPSIS: &str = "…";
const GAP: u16 = 1;
const STATUS_WIDTH: u16 = 11;
const SIZE_WIDTH: u16 = 10;
const DONE_WIDTH: u16 = 6;
const PEERS_WIDTH: u16 = 5;
const RATIO_WIDTH: u16 = 6;
const ETA_WIDTH: u16 = 6;
const NAME_MIN_WIDTH: u16 = 10;
const MIN_WIDTH: u16 = 20;
const MIN_HEIGHT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnId {
    Name,
    Size,
    Status,
    Done,
    Down,
    Up,
    Peers,
    Ratio,
    Eta,
}

impl ColumnId {
    fn title(self) -> &'static str {
        match self {
            ColumnId::Name => "Name",
            ColumnId::Size => "Size",
            ColumnId::Status => "Status",
            ColumnId::Done => "Done",
            ColumnId::Down => "Down",
            ColumnId::Up => "Up",
            ColumnId::Peers => "Peers",
            ColumnId::Ratio => "Ratio",
            ColumnId::Eta => "ETA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnId,
    pub x: u16,
    pub width: u16,
}

/// Greedy column allocation: fixed columns are reserved first, then the size
/// column and the rate columns in that order, each only while the name can
/// keep its minimum width. The name takes whatever is left.
pub fn layout_columns(total_width: u16, rate_width: u16) -> Vec<Column> {
    let fixed = [
        (ColumnId::Status, STATUS_WIDTH),
        (ColumnId::Done, DONE_WIDTH),
        (ColumnId::Peers, PEERS_WIDTH),
        (ColumnId::Ratio, RATIO_WIDTH),
        (ColumnId::Eta, ETA_WIDTH),
    ];
    let mut used: u16 = fixed.iter().map(|(_, width)| width + GAP).sum();
    let mut fits = |extra: u16| {
        let room = total_width >= used + extra + NAME_MIN_WIDTH;
        if room {
            used += extra;
        }
        room
    };
    let show_size = fits(SIZE_WIDTH + GAP);
    let show_rates = fits(2 * (rate_width + GAP));
    let name_width = total_width
        .saturating_sub(used)
        .max(NAME_MIN_WIDTH.min(total_width));

    let mut widths = vec![(ColumnId::Name, name_width)];
    if show_size {
        widths.push((ColumnId::Size, SIZE_WIDTH));
    }
    widths.extend_from_slice(&fixed[..2]);
    if show_rates {
        widths.push((ColumnId::Down, rate_width));
        widths.push((ColumnId::Up, rate_width));
    }
    widths.extend_from_slice(&fixed[2..]);

    let mut x = 0u16;
    widths
        .into_iter()
        .map(|(id, width)| {
            let column = Column { id, x, width };
            x = x.saturating_add(width).saturating_add(GAP);
            column
        })
        .collect()
}

/// Daemon identity shown in the header.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub version: String,
    pub endpoint: String,
}

/// How current the displayed data is.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    Waiting,
    Fresh {
        age: Duration,
    },
    Stale {
        error: String,
        failures: u32,
        retry_in: Duration,
    },
}

pub struct FrameInput<'a> {
    pub registry: &'a Registry,
    pub view: &'a ViewState,
    pub theme: &'a Theme,
    pub header: &'a HeaderInfo,
    pub freshness: &'a Freshness,
}

pub struct BuiltFrame {
    pub buffer: Buffer,
    pub scroll_limit: u16,
}

pub fn build_frame(input: &FrameInput<'_>, width: u16, height: u16) -> BuiltFrame {
    let mut buffer = Buffer::empty(Rect::new(0, 0, width, height));
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        put(&mut buffer, 0, 0, width, "terminal too small", Style::default());
        return BuiltFrame {
            buffer,
            scroll_limit: 0,
        };
    }

    draw_header(&mut buffer, input);
    draw_footer(&mut buffer, input);
    let body = Rect::new(0, 1, width, height - 2);
    let scroll_limit = match input.view.view() {
        View::List | View::Terminated => {
            draw_list(&mut buffer, body, input);
            0
        }
        View::Detail(tab) => draw_detail(&mut buffer, body, input, tab),
        View::RawJson => draw_raw(&mut buffer, body, input),
    };
    BuiltFrame {
        buffer,
        scroll_limit,
    }
}

/// Writes `text` clipped to `width` cells, replacing the overflow with an
/// ellipsis. Returns the column after the last written cell.
fn put(buf: &mut Buffer, x: u16, y: u16, width: u16, text: &str, style: Style) -> u16 {
    let area = buf.area;
    if y >= area.height || x >= area.width || width == 0 {
        return x;
    }
    let width = width.min(area.width - x);
    if Span::raw(text).width() <= width as usize {
        return buf.set_stringn(x, y, text, width as usize, style).0;
    }
    let (end, _) = buf.set_stringn(x, y, text, width as usize - 1, style);
    buf.set_string(end, y, ELLIPSIS, style);
    end + 1
}

fn put_right(buf: &mut Buffer, x: u16, y: u16, width: u16, text: &str, style: Style) {
    let text_width = Span::raw(text).width() as u16;
    if text_width >= width {
        put(buf, x, y, width, text, style);
    } else {
        put(buf, x + width - text_width, y, text_width, text, style);
    }
}

fn draw_header(buf: &mut Buffer, input: &FrameInput<'_>) {
    let width = buf.area.width;
    let bar = Style::default().add_modifier(Modifier::REVERSED);
    buf.set_style(Rect::new(0, 0, width, 1), bar);

    let (right, right_style) = match input.freshness {
        Freshness::Waiting => ("waiting for daemon…".to_string(), bar),
        Freshness::Fresh { age } => (format!("updated {}s ago", age.as_secs()), bar),
        Freshness::Stale {
            error,
            failures,
            retry_in,
        } => (
            format!(
                "STALE: {error} ({failures}x, retry in {}s)",
                retry_in.as_secs()
            ),
            bar.fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    let right_width = (Span::raw(right.as_str()).width() as u16).min(width);
    let left = format!(
        " transmission-top  {} @ {}  sort: {}",
        input.header.version,
        input.header.endpoint,
        input.registry.sort_order().label()
    );
    let left_width = width.saturating_sub(right_width + 1);
    put(buf, 0, 0, left_width, &left, bar);
    put_right(buf, left_width, 0, width - left_width, &right, right_style);
}

fn draw_footer(buf: &mut Buffer, input: &FrameInput<'_>) {
    let width = buf.area.width;
    let y = buf.area.height - 1;
    let bar = Style::default().add_modifier(Modifier::REVERSED);
    buf.set_style(Rect::new(0, y, width, 1), bar);

    let (down, up) = input
        .registry
        .ordered()
        .fold((0u64, 0u64), |(down, up), entry| {
            (down + entry.download_rate, up + entry.upload_rate)
        });
    let left = format!(
        " Torrents: {}  ↓ {}  ↑ {}",
        input.registry.len(),
        format_speed(down),
        format_speed(up)
    );
    let hints = match input.view.view() {
        View::List | View::Terminated => "enter:open s:sort S:reverse R:refresh q:quit ",
        View::Detail(_) => "tab/o f e t c:tabs r:raw j/k:scroll esc:back ",
        View::RawJson => "j/k:scroll g/G:top/bottom esc:back ",
    };
    let hints_width = (Span::raw(hints).width() as u16).min(width / 2);
    let left_width = width - hints_width;
    put(buf, 0, y, left_width, &left, bar);
    put_right(buf, left_width, y, hints_width, hints, bar);
}

fn rate_width(registry: &Registry) -> u16 {
    registry
        .ordered()
        .flat_map(|entry| [format_speed(entry.download_rate), format_speed(entry.upload_rate)])
        .map(|text| text.chars().count() as u16)
        .chain([ColumnId::Down.title().len() as u16])
        .max()
        .unwrap_or(4)
}

fn draw_list(buf: &mut Buffer, area: Rect, input: &FrameInput<'_>) {
    let columns = layout_columns(area.width, rate_width(input.registry));
    let title_style = Style::default().add_modifier(Modifier::BOLD);
    for column in &columns {
        if column.id == ColumnId::Name {
            put(buf, column.x, area.y, column.width, column.id.title(), title_style);
        } else {
            put_right(buf, column.x, area.y, column.width, column.id.title(), title_style);
        }
    }

    let first_row = area.y + 1;
    let visible = area.height.saturating_sub(1) as usize;
    if input.registry.is_empty() {
        put(
            buf,
            1,
            first_row,
            area.width - 1,
            "No torrents reported by the daemon",
            Style::default().add_modifier(Modifier::DIM),
        );
        return;
    }

    let selected_row = input
        .view
        .selected()
        .and_then(|id| input.registry.position(id));
    let offset = match selected_row {
        Some(row) if row >= visible => row + 1 - visible,
        _ => 0,
    };
    for (index, entry) in input
        .registry
        .ordered()
        .enumerate()
        .skip(offset)
        .take(visible)
    {
        let y = first_row + (index - offset) as u16;
        let mut style = Style::default().fg(input.theme.color_for(entry.status));
        if Some(index) == selected_row {
            style = style.add_modifier(Modifier::REVERSED);
            buf.set_style(Rect::new(0, y, area.width, 1), style);
        }
        for column in &columns {
            draw_cell(buf, *column, y, entry, style);
        }
    }
}

fn draw_cell(buf: &mut Buffer, column: Column, y: u16, entry: &TorrentEntry, style: Style) {
    let text = match column.id {
        ColumnId::Name => {
            put(buf, column.x, y, column.width, &entry.name, style);
            return;
        }
        ColumnId::Size => format_bytes(entry.size_bytes),
        ColumnId::Status => entry.status.label().to_string(),
        ColumnId::Done => format_progress(entry.percent_done),
        ColumnId::Down => format_speed(entry.download_rate),
        ColumnId::Up => format_speed(entry.upload_rate),
        ColumnId::Peers => entry.peers_connected.to_string(),
        ColumnId::Ratio => format_ratio(entry.ratio),
        ColumnId::Eta => format_eta(entry.eta),
    };
    put_right(buf, column.x, y, column.width, &text, style);
}

fn selected_entry<'a>(input: &FrameInput<'a>) -> Option<&'a TorrentEntry> {
    input.view.selected().and_then(|id| input.registry.get(id))
}

fn draw_detail(buf: &mut Buffer, area: Rect, input: &FrameInput<'_>, active: DetailTab) -> u16 {
    let Some(entry) = selected_entry(input) else {
        put(buf, 1, area.y, area.width - 1, "No torrent selected", Style::default());
        return 0;
    };
    draw_tab_bar(buf, area.y, area.width, Some(active));
    draw_summary(buf, area.y + 1, area.width, entry, input.theme);

    let lines = match active {
        DetailTab::Overview => overview_lines(entry),
        DetailTab::Trackers => match &entry.details.trackers {
            Section::Present(trackers) if trackers.is_empty() => {
                vec![Line::from(" No trackers configured")]
            }
            Section::Present(trackers) => trackers
                .iter()
                .map(|tracker| {
                    Line::from(format!(
                        " tier {:<2} {:<32} seeds {:>5}  leeches {:>5}  {}",
                        tracker.tier,
                        tracker.host,
                        count_or_unknown(tracker.seeders),
                        count_or_unknown(tracker.leechers),
                        tracker.last_announce_result
                    ))
                })
                .collect(),
            Section::NotYetAvailable => not_yet_available(active),
        },
        DetailTab::Files => match &entry.details.files {
            Section::Present(files) if files.is_empty() => vec![Line::from(" No files reported")],
            Section::Present(files) => file_lines(files),
            Section::NotYetAvailable => not_yet_available(active),
        },
        DetailTab::Peers | DetailTab::Chunks => not_yet_available(active),
    };
    let pane = Rect::new(area.x, area.y + 3, area.width, area.height.saturating_sub(3));
    scrolled(buf, pane, lines, input.view.scroll())
}

fn draw_raw(buf: &mut Buffer, area: Rect, input: &FrameInput<'_>) -> u16 {
    let Some(entry) = selected_entry(input) else {
        put(buf, 1, area.y, area.width - 1, "No torrent selected", Style::default());
        return 0;
    };
    draw_tab_bar(buf, area.y, area.width, None);
    draw_summary(buf, area.y + 1, area.width, entry, input.theme);

    let text = serde_json::to_string_pretty(&entry.raw_snapshot)
        .unwrap_or_else(|err| format!("unprintable record: {err}"));
    let mut lines = vec![Line::from(format!("JSON size: {}", text.len()))];
    lines.extend(text.lines().map(|line| Line::from(line.to_string())));
    let pane = Rect::new(area.x, area.y + 3, area.width, area.height.saturating_sub(3));
    scrolled(buf, pane, lines, input.view.scroll())
}

fn scrolled(buf: &mut Buffer, pane: Rect, lines: Vec<Line<'static>>, scroll: u16) -> u16 {
    let limit = u16::try_from(lines.len())
        .unwrap_or(u16::MAX)
        .saturating_sub(pane.height);
    Paragraph::new(lines)
        .scroll((scroll.min(limit), 0))
        .render(pane, buf);
    limit
}

fn draw_tab_bar(buf: &mut Buffer, y: u16, width: u16, active: Option<DetailTab>) {
    let mut x = 1;
    let tabs = DetailTab::ALL
        .into_iter()
        .map(|tab| (tab.label(), tab.hotkey(), active == Some(tab)))
        .chain([("Raw", 'r', active.is_none())]);
    for (label, hotkey, is_active) in tabs {
        let base = if is_active {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let split = label
            .char_indices()
            .find(|(_, c)| c.to_ascii_lowercase() == hotkey)
            .map(|(i, c)| (i, c.len_utf8()));
        match split {
            Some((at, len)) => {
                x = put(buf, x, y, width.saturating_sub(x), &label[..at], base);
                x = put(
                    buf,
                    x,
                    y,
                    width.saturating_sub(x),
                    &label[at..at + len],
                    base.add_modifier(Modifier::UNDERLINED),
                );
                x = put(buf, x, y, width.saturating_sub(x), &label[at + len..], base);
            }
            None => x = put(buf, x, y, width.saturating_sub(x), label, base),
        }
        x = x.saturating_add(2);
    }
}

fn draw_summary(buf: &mut Buffer, y: u16, width: u16, entry: &TorrentEntry, theme: &Theme) {
    let color = Style::default().fg(theme.color_for(entry.status));
    let status = format!(
        "  {} {}  ↓ {}  ↑ {}",
        entry.status.label(),
        format_progress(entry.percent_done),
        format_speed(entry.download_rate),
        format_speed(entry.upload_rate)
    );
    let status_width = (Span::raw(status.as_str()).width() as u16).min(width / 2);
    let name_width = width - status_width;
    put(buf, 1, y, name_width.saturating_sub(1), &entry.name, color.add_modifier(Modifier::BOLD));
    put_right(buf, name_width, y, status_width, &status, color);
}

fn overview_lines(entry: &TorrentEntry) -> Vec<Line<'static>> {
    let mut rows = vec![
        ("Name", entry.name.clone()),
        ("ID", entry.id.to_string()),
        ("Hash", entry.hash.clone()),
        ("Status", entry.status.label().to_string()),
        ("Location", entry.download_dir.clone()),
        (
            "Size",
            format!(
                "{} wanted;  {} left",
                size_with_units(entry.size_bytes),
                size_with_units(entry.left_until_done)
            ),
        ),
        ("Progress", format_progress(entry.percent_done).trim().to_string()),
        (
            "Chunks",
            format!("{};  {} each", entry.piece_count, size_with_units(entry.piece_size)),
        ),
        (
            "Downloaded",
            format!(
                "{} ({}%) received;  {} ({}%) verified;  {} corrupt",
                size_with_units(entry.downloaded_bytes),
                percent_of(entry.downloaded_bytes, entry.size_bytes),
                size_with_units(entry.have_valid),
                percent_of(entry.have_valid, entry.size_bytes),
                size_with_units(entry.corrupt_bytes)
            ),
        ),
        (
            "Uploaded",
            format!(
                "{} ({}%) transmitted",
                size_with_units(entry.uploaded_bytes),
                percent_of(entry.uploaded_bytes, entry.size_bytes)
            ),
        ),
        ("Ratio", format!("{} copies distributed", format_ratio(entry.ratio))),
        (
            "Rates",
            format!(
                "↓ {}  ↑ {}",
                format_speed(entry.download_rate),
                format_speed(entry.upload_rate)
            ),
        ),
        ("ETA", format_eta(entry.eta)),
        (
            "Swarm",
            format!(
                "{} peers connected;  {} seeds;  {} leeches",
                entry.peers_connected,
                format_count(entry.seeders),
                format_count(entry.leechers)
            ),
        ),
    ];
    if let Section::Present(files) = &entry.details.files {
        let complete = files.iter().filter(|file| file.is_complete()).count();
        let started = files.iter().filter(|file| file.bytes_completed > 0).count();
        let summary = if complete == files.len() {
            format!("{};  all complete", files.len())
        } else {
            format!("{};  {complete} complete;  {started} commenced", files.len())
        };
        rows.insert(6, ("Files", summary));
    }
    if let Some(error) = &entry.error {
        rows.push(("Error", error.clone()));
    }
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    rows.into_iter()
        .map(|(label, value)| {
            let style = if label == "Error" {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(
                    format!(" {label:>label_width$}: "),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(value, style),
            ])
        })
        .collect()
}

/// One row per file, sorted by path: index, completion, size, path.
fn file_lines(files: &[FileStat]) -> Vec<Line<'static>> {
    let mut sorted: Vec<&FileStat> = files.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, file)| {
            Line::from(format!(
                "{:>4}{:>9}%{:>11}  {}",
                index + 1,
                percent_of(file.bytes_completed, file.length),
                format_bytes(file.length),
                file.name
            ))
        })
        .collect()
}

fn percent_of(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 / whole as f64 * 100.0)
}

fn not_yet_available(tab: DetailTab) -> Vec<Line<'static>> {
    vec![Line::from(Span::styled(
        format!(" {} information is not yet available", tab.label()),
        Style::default().add_modifier(Modifier::DIM),
    ))]
}

fn count_or_unknown(count: i64) -> String {
    if count < 0 {
        "?".to_string()
    } else {
        count.to_string()
    }
}

fn size_with_units(bytes: u64) -> String {
    if bytes == 0 {
        return "nothing".to_string();
    }
    let digits = bytes.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped} [{}]", format_bytes(bytes))
}
