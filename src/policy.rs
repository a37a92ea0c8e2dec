use std::{cmp::Reverse, str::FromStr};

use anyhow::{anyhow, Result};
use ratatui::style::Color;

use crate::model::{Ratio, Status, TorrentEntry, TorrentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Status,
    Name,
    Size,
    DownloadRate,
    UploadRate,
    Ratio,
    Peers,
}

impl SortField {
    const CYCLE: [SortField; 7] = [
        SortField::Status,
        SortField::Name,
        SortField::Size,
        SortField::DownloadRate,
        SortField::UploadRate,
        SortField::Ratio,
        SortField::Peers,
    ];

    pub fn next(self) -> Self {
        let index = Self::CYCLE.iter().position(|f| *f == self).unwrap_or(0);
        Self::CYCLE[(index + 1) % Self::CYCLE.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Status => "status",
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::DownloadRate => "download",
            SortField::UploadRate => "upload",
            SortField::Ratio => "ratio",
            SortField::Peers => "peers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    pub field: SortField,
    pub reversed: bool,
}

impl SortOrder {
    pub fn rotate(self) -> Self {
        Self {
            field: self.field.next(),
            reversed: false,
        }
    }

    pub fn reverse(self) -> Self {
        Self {
            field: self.field,
            reversed: !self.reversed,
        }
    }

    pub fn label(self) -> String {
        if self.reversed {
            format!("{} (rev)", self.field.label())
        } else {
            self.field.label().to_string()
        }
    }
}

/// Lower ranks sort first.
pub fn status_priority(status: Status) -> u8 {
    match status {
        Status::Error => 0,
        Status::Downloading => 1,
        Status::Seeding => 2,
        Status::Checking => 3,
        Status::Idle => 4,
        Status::Paused => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Primary {
    Status(u8, Reverse<u64>),
    Text,
    Descending(Reverse<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Direction<T> {
    Forward(T),
    Backward(Reverse<T>),
}

/// Total ordering key: the selected field first, then the case-folded name,
/// the exact name and finally the id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    primary: Direction<Primary>,
    folded_name: String,
    name: String,
    id: TorrentId,
}

pub fn sort_key(entry: &TorrentEntry, order: SortOrder) -> SortKey {
    let primary = match order.field {
        SortField::Status => Primary::Status(
            status_priority(entry.status),
            Reverse(entry.download_rate),
        ),
        SortField::Name => Primary::Text,
        SortField::Size => Primary::Descending(Reverse(entry.size_bytes)),
        SortField::DownloadRate => Primary::Descending(Reverse(entry.download_rate)),
        SortField::UploadRate => Primary::Descending(Reverse(entry.upload_rate)),
        SortField::Ratio => Primary::Descending(Reverse(ratio_rank(entry.ratio))),
        SortField::Peers => Primary::Descending(Reverse(entry.peers_connected as u64)),
    };
    // Reversing a name sort has to flip the name itself, not the constant primary.
    let primary = if order.reversed && order.field != SortField::Name {
        Direction::Backward(Reverse(primary))
    } else {
        Direction::Forward(primary)
    };
    let folded_name = entry.name.to_lowercase();
    if order.reversed && order.field == SortField::Name {
        return SortKey {
            primary,
            folded_name: invert(&folded_name),
            name: invert(&entry.name),
            id: entry.id,
        };
    }
    SortKey {
        primary,
        folded_name,
        name: entry.name.clone(),
        id: entry.id,
    }
}

fn ratio_rank(ratio: Ratio) -> u64 {
    match ratio {
        Ratio::Infinite => u64::MAX,
        Ratio::Finite(value) => (value.max(0.0) * 1_000.0) as u64,
    }
}

const SURROGATES: u32 = 0x800;
const LAST_SCALAR_INDEX: u32 = char::MAX as u32 - SURROGATES;

// Maps each char to its complement so plain string ordering runs backwards.
// The complement is taken over scalar values only, skipping the surrogate
// gap, so every char has an image. The trailing sentinel keeps a prefix
// after its extensions.
fn invert(text: &str) -> String {
    let mut out: String = text.chars().map(complement).collect();
    out.push(char::MAX);
    out
}

fn complement(c: char) -> char {
    let code = c as u32;
    let index = if code > 0xDFFF { code - SURROGATES } else { code };
    let flipped = LAST_SCALAR_INDEX - index;
    let code = if flipped >= 0xD800 { flipped + SURROGATES } else { flipped };
    char::from_u32(code).unwrap_or(c)
}

/// Status colors. Every status has exactly one slot, so lookups are total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub idle: Color,
    pub downloading: Color,
    pub seeding: Color,
    pub paused: Color,
    pub error: Color,
    pub checking: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            idle: Color::Cyan,
            downloading: Color::Blue,
            seeding: Color::Green,
            paused: Color::DarkGray,
            error: Color::Red,
            checking: Color::Yellow,
        }
    }
}

impl Theme {
    pub fn color_for(&self, status: Status) -> Color {
        match status {
            Status::Idle => self.idle,
            Status::Downloading => self.downloading,
            Status::Seeding => self.seeding,
            Status::Paused => self.paused,
            Status::Error => self.error,
            Status::Checking => self.checking,
        }
    }

    pub fn set(&mut self, status: Status, color: Color) {
        let slot = match status {
            Status::Idle => &mut self.idle,
            Status::Downloading => &mut self.downloading,
            Status::Seeding => &mut self.seeding,
            Status::Paused => &mut self.paused,
            Status::Error => &mut self.error,
            Status::Checking => &mut self.checking,
        };
        *slot = color;
    }

    /// Applies `status = color` overrides, e.g. from a config `[theme]` table.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (status_name, color_name) in overrides {
            let status = Status::ALL
                .into_iter()
                .find(|status| status.label() == status_name.to_ascii_lowercase())
                .ok_or_else(|| anyhow!("unknown status '{status_name}' in theme"))?;
            let color = Color::from_str(color_name)
                .map_err(|_| anyhow!("unknown color '{color_name}' for {status_name}"))?;
            self.set(status, color);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{tests::record, TorrentEntry};

    fn entry(id: i64, name: &str, status_code: i64, rate: u64) -> TorrentEntry {
        let mut rec = record(id, name, status_code);
        rec.download_rate = rate;
        TorrentEntry::from(rec)
    }

    fn sorted_names(mut entries: Vec<TorrentEntry>, order: SortOrder) -> Vec<String> {
        entries.sort_by_key(|e| sort_key(e, order));
        entries.into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_default_order_by_status_rate_then_name() {
        let mut errored = record(1, "zeta", 6);
        errored.error_string = "tracker gone".to_string();
        let entries = vec![
            entry(2, "paused", 0, 0),
            entry(3, "Beta", 6, 0),
            entry(4, "alpha", 6, 0),
            entry(5, "slow", 4, 10),
            entry(6, "fast", 4, 500),
            entry(7, "checking", 2, 0),
            entry(8, "queued", 3, 0),
            TorrentEntry::from(errored),
        ];
        assert_eq!(
            sorted_names(entries, SortOrder::default()),
            vec!["zeta", "fast", "slow", "alpha", "Beta", "checking", "queued", "paused"]
        );
    }

    #[test]
    fn test_sort_key_is_total() {
        let entries = vec![
            entry(1, "same", 6, 0),
            entry(2, "same", 6, 0),
            entry(3, "Same", 6, 0),
            entry(4, "other", 6, 0),
        ];
        for field in SortField::CYCLE {
            for reversed in [false, true] {
                let order = SortOrder { field, reversed };
                for a in &entries {
                    for b in &entries {
                        let equal = sort_key(a, order) == sort_key(b, order);
                        assert_eq!(equal, a.id == b.id, "{field:?} {reversed}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_reverse_name_sort() {
        let entries = vec![entry(1, "ab", 6, 0), entry(2, "a", 6, 0), entry(3, "b", 6, 0)];
        let order = SortOrder {
            field: SortField::Name,
            reversed: false,
        };
        assert_eq!(sorted_names(entries.clone(), order), vec!["a", "ab", "b"]);
        assert_eq!(sorted_names(entries, order.reverse()), vec!["b", "ab", "a"]);
    }

    #[test]
    fn test_reverse_name_sort_beyond_the_surrogate_gap() {
        let entries = vec![
            entry(1, "a", 6, 0),
            entry(2, "\u{102000}", 6, 0),
            entry(3, "\u{E000}", 6, 0),
            entry(4, "\u{1027FF}", 6, 0),
        ];
        let order = SortOrder {
            field: SortField::Name,
            reversed: true,
        };
        assert_eq!(
            sorted_names(entries, order),
            vec!["\u{1027FF}", "\u{102000}", "\u{E000}", "a"]
        );
    }

    #[test]
    fn test_complement_reverses_scalar_order() {
        let samples = ['\0', 'a', '\u{D7FF}', '\u{E000}', '\u{102000}', '\u{1027FF}', char::MAX];
        for pair in samples.windows(2) {
            assert!(complement(pair[0]) > complement(pair[1]), "{pair:?}");
        }
        assert_eq!(complement('\0'), char::MAX);
        assert_eq!(complement(char::MAX), '\0');
    }

    #[test]
    fn test_rotation_cycles_all_fields() {
        let mut order = SortOrder::default().reverse();
        let mut seen = Vec::new();
        for _ in 0..SortField::CYCLE.len() {
            order = order.rotate();
            assert!(!order.reversed);
            seen.push(order.field);
        }
        assert_eq!(order.field, SortField::Status);
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_color_for_is_total_and_stable() {
        let theme = Theme::default();
        assert_eq!(theme.color_for(Status::Idle), Color::Cyan);
        assert_eq!(theme.color_for(Status::Downloading), Color::Blue);
        assert_eq!(theme.color_for(Status::Error), Color::Red);
        for status in Status::ALL {
            assert_eq!(theme.color_for(status), theme.color_for(status));
        }
    }

    #[test]
    fn test_theme_overrides() {
        let theme = Theme::default()
            .with_overrides([("Seeding", "magenta"), ("paused", "gray")])
            .unwrap();
        assert_eq!(theme.color_for(Status::Seeding), Color::Magenta);
        assert_eq!(theme.color_for(Status::Paused), Color::Gray);
        assert!(Theme::default().with_overrides([("leeching", "red")]).is_err());
        assert!(Theme::default().with_overrides([("idle", "not-a-color")]).is_err());
    }
}
