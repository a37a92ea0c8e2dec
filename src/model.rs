use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use log::warn;
use serde_json::Value;

use crate::policy::{sort_key, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TorrentId(pub i64);

impl fmt::Display for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    Downloading,
    Seeding,
    Paused,
    Error,
    Checking,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Idle,
        Status::Downloading,
        Status::Seeding,
        Status::Paused,
        Status::Error,
        Status::Checking,
    ];

    /// Collapses the daemon's seven queue/activity codes onto the dashboard
    /// statuses. Errors win over activity; a download that moves no bytes is idle.
    pub fn from_daemon(code: i64, download_rate: u64, has_error: bool) -> Self {
        if has_error {
            return Status::Error;
        }
        match code {
            0 => Status::Paused,
            1 | 2 => Status::Checking,
            4 if download_rate > 0 => Status::Downloading,
            6 => Status::Seeding,
            _ => Status::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Downloading => "downloading",
            Status::Seeding => "seeding",
            Status::Paused => "paused",
            Status::Error => "error",
            Status::Checking => "checking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    Known(Duration),
    Unknown,
}

impl Eta {
    /// Time to fetch what the daemon still reports as missing. Downloaded
    /// totals are not used because rechecks and discarded pieces inflate them.
    pub fn derive(left_until_done: u64, download_rate: u64) -> Self {
        if left_until_done == 0 || download_rate == 0 {
            return Eta::Unknown;
        }
        Eta::Known(Duration::from_secs(left_until_done.div_ceil(download_rate)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Finite(f64),
    Infinite,
}

impl Ratio {
    pub fn derive(uploaded_bytes: u64, downloaded_bytes: u64) -> Self {
        if downloaded_bytes == 0 {
            if uploaded_bytes > 0 {
                Ratio::Infinite
            } else {
                Ratio::Finite(0.0)
            }
        } else {
            Ratio::Finite(uploaded_bytes as f64 / downloaded_bytes as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStat {
    pub host: String,
    pub tier: i64,
    pub seeders: i64,
    pub leechers: i64,
    pub last_announce_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub length: u64,
    pub bytes_completed: u64,
}

impl FileStat {
    pub fn is_complete(&self) -> bool {
        self.bytes_completed >= self.length
    }
}

/// A detail sub-section the daemon may or may not have reported yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section<T> {
    NotYetAvailable,
    Present(Vec<T>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSections {
    pub trackers: Section<TrackerStat>,
    pub files: Section<FileStat>,
}

impl<T> From<Option<Vec<T>>> for Section<T> {
    fn from(list: Option<Vec<T>>) -> Self {
        list.map_or(Section::NotYetAvailable, Section::Present)
    }
}

/// One torrent as reported by a single poll, before derivation.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub id: TorrentId,
    pub name: String,
    pub status_code: i64,
    pub error_code: i64,
    pub error_string: String,
    pub size_bytes: u64,
    pub left_until_done: u64,
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub have_valid: u64,
    pub corrupt_bytes: u64,
    pub piece_count: u64,
    pub piece_size: u64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub peers_connected: u32,
    pub percent_done: f64,
    pub download_dir: String,
    pub hash: String,
    pub trackers: Option<Vec<TrackerStat>>,
    pub files: Option<Vec<FileStat>>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TorrentEntry {
    pub id: TorrentId,
    pub name: String,
    pub status: Status,
    pub size_bytes: u64,
    pub left_until_done: u64,
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub have_valid: u64,
    pub corrupt_bytes: u64,
    pub piece_count: u64,
    pub piece_size: u64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub peers_connected: u32,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub eta: Eta,
    pub ratio: Ratio,
    pub percent_done: f64,
    pub download_dir: String,
    pub hash: String,
    pub error: Option<String>,
    pub details: DetailSections,
    pub raw_snapshot: Value,
}

impl From<RawRecord> for TorrentEntry {
    fn from(record: RawRecord) -> Self {
        let error = if record.error_string.is_empty() {
            (record.error_code != 0).then(|| format!("daemon error {}", record.error_code))
        } else {
            Some(record.error_string)
        };
        let status = Status::from_daemon(record.status_code, record.download_rate, error.is_some());
        let (seeders, leechers) = record
            .trackers
            .as_deref()
            .map(swarm_counts)
            .unwrap_or((None, None));
        TorrentEntry {
            id: record.id,
            name: record.name,
            status,
            size_bytes: record.size_bytes,
            left_until_done: record.left_until_done,
            downloaded_bytes: record.downloaded_bytes,
            uploaded_bytes: record.uploaded_bytes,
            have_valid: record.have_valid,
            corrupt_bytes: record.corrupt_bytes,
            piece_count: record.piece_count,
            piece_size: record.piece_size,
            download_rate: record.download_rate,
            upload_rate: record.upload_rate,
            peers_connected: record.peers_connected,
            seeders,
            leechers,
            eta: Eta::derive(record.left_until_done, record.download_rate),
            ratio: Ratio::derive(record.uploaded_bytes, record.downloaded_bytes),
            percent_done: record.percent_done,
            download_dir: record.download_dir,
            hash: record.hash,
            error,
            details: DetailSections {
                trackers: record.trackers.into(),
                files: record.files.into(),
            },
            raw_snapshot: record.raw,
        }
    }
}

// Trackers report -1 until they have been scraped.
fn swarm_counts(trackers: &[TrackerStat]) -> (Option<u32>, Option<u32>) {
    let best = |pick: fn(&TrackerStat) -> i64| {
        trackers
            .iter()
            .map(pick)
            .max()
            .filter(|count| *count >= 0)
            .map(|count| count.min(u32::MAX as i64) as u32)
    };
    (best(|t| t.seeders), best(|t| t.leechers))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Status,
    Size,
    Remaining,
    Downloaded,
    Uploaded,
    Verified,
    Pieces,
    DownloadRate,
    UploadRate,
    Peers,
    Swarm,
    Eta,
    Ratio,
    Progress,
    Location,
    Error,
    Details,
    Raw,
}

impl TorrentEntry {
    pub fn changed_fields(&self, next: &TorrentEntry) -> Vec<Field> {
        let mut fields = Vec::new();
        let mut check = |changed: bool, field: Field| {
            if changed {
                fields.push(field);
            }
        };
        check(self.name != next.name, Field::Name);
        check(self.status != next.status, Field::Status);
        check(self.size_bytes != next.size_bytes, Field::Size);
        check(self.left_until_done != next.left_until_done, Field::Remaining);
        check(self.downloaded_bytes != next.downloaded_bytes, Field::Downloaded);
        check(self.uploaded_bytes != next.uploaded_bytes, Field::Uploaded);
        check(
            self.have_valid != next.have_valid || self.corrupt_bytes != next.corrupt_bytes,
            Field::Verified,
        );
        check(
            self.piece_count != next.piece_count || self.piece_size != next.piece_size,
            Field::Pieces,
        );
        check(self.download_rate != next.download_rate, Field::DownloadRate);
        check(self.upload_rate != next.upload_rate, Field::UploadRate);
        check(self.peers_connected != next.peers_connected, Field::Peers);
        check(
            self.seeders != next.seeders || self.leechers != next.leechers,
            Field::Swarm,
        );
        check(self.eta != next.eta, Field::Eta);
        check(self.ratio != next.ratio, Field::Ratio);
        check(self.percent_done != next.percent_done, Field::Progress);
        check(self.download_dir != next.download_dir, Field::Location);
        check(self.error != next.error, Field::Error);
        check(self.details != next.details, Field::Details);
        check(self.raw_snapshot != next.raw_snapshot, Field::Raw);
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Inserted,
    Updated(Vec<Field>),
    Removed,
}

/// Per-id outcome of one snapshot application, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<(TorrentId, Change)>,
}

impl ChangeSet {
    pub fn removed(&self) -> impl Iterator<Item = TorrentId> + '_ {
        self.changes
            .iter()
            .filter(|(_, change)| matches!(change, Change::Removed))
            .map(|(id, _)| *id)
    }

    pub fn is_removed(&self, id: TorrentId) -> bool {
        self.removed().any(|removed| removed == id)
    }

    /// True when nothing observable changed.
    pub fn is_quiet(&self) -> bool {
        self.changes.iter().all(|(_, change)| match change {
            Change::Updated(fields) => fields.is_empty(),
            _ => false,
        })
    }
}

pub struct Registry {
    entries: HashMap<TorrentId, TorrentEntry>,
    arrival: HashMap<TorrentId, u64>,
    next_arrival: u64,
    order: Vec<TorrentId>,
    sort: SortOrder,
}

impl Registry {
    pub fn new(sort: SortOrder) -> Self {
        Self {
            entries: HashMap::new(),
            arrival: HashMap::new(),
            next_arrival: 0,
            order: Vec::new(),
            sort,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: TorrentId) -> Option<&TorrentEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TorrentId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids in display order.
    pub fn order(&self) -> &[TorrentId] {
        &self.order
    }

    pub fn position(&self, id: TorrentId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    pub fn ordered(&self) -> impl Iterator<Item = &TorrentEntry> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
        self.resort();
    }

    /// Merges one poll's records into the registry by id. The records are
    /// sorted first so the result never depends on the daemon's ordering.
    pub fn apply_snapshot(&mut self, mut records: Vec<RawRecord>) -> ChangeSet {
        records.sort_by_key(|record| record.id);
        let mut incoming: Vec<TorrentEntry> = Vec::with_capacity(records.len());
        for record in records {
            let entry = TorrentEntry::from(record);
            match incoming.last_mut() {
                Some(last) if last.id == entry.id => {
                    warn!("snapshot repeats torrent {}; keeping the later record", entry.id);
                    *last = entry;
                }
                _ => incoming.push(entry),
            }
        }

        let mut changes = Vec::with_capacity(incoming.len());
        let mut seen = HashSet::with_capacity(incoming.len());
        for entry in incoming {
            let id = entry.id;
            seen.insert(id);
            match self.entries.get_mut(&id) {
                Some(existing) => {
                    let fields = existing.changed_fields(&entry);
                    *existing = entry;
                    changes.push((id, Change::Updated(fields)));
                }
                None => {
                    self.arrival.insert(id, self.next_arrival);
                    self.next_arrival += 1;
                    self.entries.insert(id, entry);
                    changes.push((id, Change::Inserted));
                }
            }
        }

        let mut gone: Vec<TorrentId> = self
            .entries
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        gone.sort();
        for id in gone {
            self.entries.remove(&id);
            self.arrival.remove(&id);
            changes.push((id, Change::Removed));
        }
        changes.sort_by_key(|(id, _)| *id);

        self.resort();
        ChangeSet { changes }
    }

    fn resort(&mut self) {
        let mut keyed: Vec<_> = self
            .entries
            .values()
            .map(|entry| {
                let arrival = self.arrival.get(&entry.id).copied().unwrap_or(u64::MAX);
                (sort_key(entry, self.sort), arrival, entry.id)
            })
            .collect();
        keyed.sort();
        self.order = keyed.into_iter().map(|(_, _, id)| id).collect();
    }
}

pub fn format_speed(value: u64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];
    scaled(value, &UNITS, "")
}

pub fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    scaled(value, &UNITS, " ")
}

fn scaled(value: u64, units: &[&str], separator: &str) -> String {
    let mut magnitude = value as f64;
    let mut unit = 0;
    while magnitude >= 1024.0 && unit < units.len() - 1 {
        magnitude /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}{}", magnitude, separator, units[unit])
}

pub fn format_progress(value: f64) -> String {
    format!("{:5.1}%", value * 100.0)
}

pub fn format_eta(eta: Eta) -> String {
    match eta {
        Eta::Unknown => "-".to_string(),
        Eta::Known(duration) => {
            let days = duration.as_secs() / 86_400;
            let hours = (duration.as_secs() % 86_400) / 3_600;
            let minutes = (duration.as_secs() % 3_600) / 60;
            let seconds = duration.as_secs() % 60;
            if days > 0 {
                format!("{}d{}h", days, hours)
            } else if hours > 0 {
                format!("{}h{}m", hours, minutes)
            } else if minutes > 0 {
                format!("{}m", minutes)
            } else {
                format!("{}s", seconds)
            }
        }
    }
}

pub fn format_ratio(ratio: Ratio) -> String {
    match ratio {
        Ratio::Infinite => "∞".to_string(),
        Ratio::Finite(value) => format!("{:.2}", value),
    }
}

pub fn format_count(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |count| count.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn record(id: i64, name: &str, status_code: i64) -> RawRecord {
        RawRecord {
            id: TorrentId(id),
            name: name.to_string(),
            status_code,
            error_code: 0,
            error_string: String::new(),
            size_bytes: 100,
            left_until_done: 100,
            downloaded_bytes: 0,
            uploaded_bytes: 0,
            have_valid: 0,
            corrupt_bytes: 0,
            piece_count: 0,
            piece_size: 0,
            download_rate: 0,
            upload_rate: 0,
            peers_connected: 0,
            percent_done: 0.0,
            download_dir: "/downloads".to_string(),
            hash: format!("hash{id}"),
            trackers: None,
            files: None,
            raw: json!({ "id": id, "name": name }),
        }
    }

    fn ids(registry: &Registry) -> Vec<i64> {
        let mut ids: Vec<i64> = registry.order().iter().map(|id| id.0).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_derived_ratio_and_eta() {
        let mut rec = record(1, "ubuntu.iso", 4);
        rec.downloaded_bytes = 50;
        rec.left_until_done = 50;
        rec.uploaded_bytes = 10;
        rec.download_rate = 5;
        let entry = TorrentEntry::from(rec.clone());
        assert_eq!(entry.status, Status::Downloading);
        assert_eq!(entry.ratio, Ratio::Finite(0.2));
        assert_eq!(entry.eta, Eta::Known(Duration::from_secs(10)));

        rec.download_rate = 0;
        let stalled = TorrentEntry::from(rec);
        assert_eq!(stalled.eta, Eta::Unknown);
        assert_eq!(stalled.status, Status::Idle);
    }

    #[test]
    fn test_ratio_sentinels() {
        assert_eq!(Ratio::derive(10, 0), Ratio::Infinite);
        assert_eq!(Ratio::derive(0, 0), Ratio::Finite(0.0));
        assert_eq!(format_ratio(Ratio::Infinite), "∞");
        assert_eq!(format_ratio(Ratio::derive(1, 4)), "0.25");
    }

    #[test]
    fn test_eta_unknown_when_complete() {
        assert_eq!(Eta::derive(0, 50), Eta::Unknown);
        assert_eq!(Eta::derive(1, 50), Eta::Known(Duration::from_secs(1)));
        assert_eq!(Eta::derive(120, 0), Eta::Unknown);
    }

    #[test]
    fn test_eta_follows_bytes_left_not_bytes_downloaded() {
        let mut rec = record(1, "rechecked", 4);
        rec.left_until_done = 1;
        rec.downloaded_bytes = 0;
        rec.download_rate = 1;
        assert_eq!(TorrentEntry::from(rec.clone()).eta, Eta::Known(Duration::from_secs(1)));

        // Discarded pieces push the downloaded total past the size.
        rec.left_until_done = 40;
        rec.downloaded_bytes = 150;
        rec.download_rate = 10;
        assert_eq!(TorrentEntry::from(rec).eta, Eta::Known(Duration::from_secs(4)));
    }

    #[test]
    fn test_files_section_follows_daemon_report() {
        let mut rec = record(1, "album", 4);
        assert_eq!(TorrentEntry::from(rec.clone()).details.files, Section::NotYetAvailable);

        rec.files = Some(vec![FileStat {
            name: "album/01.flac".to_string(),
            length: 10,
            bytes_completed: 10,
        }]);
        let entry = TorrentEntry::from(rec);
        assert!(matches!(entry.details.files, Section::Present(ref files) if files[0].is_complete()));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Status::from_daemon(0, 0, false), Status::Paused);
        assert_eq!(Status::from_daemon(1, 0, false), Status::Checking);
        assert_eq!(Status::from_daemon(2, 0, false), Status::Checking);
        assert_eq!(Status::from_daemon(3, 0, false), Status::Idle);
        assert_eq!(Status::from_daemon(4, 10, false), Status::Downloading);
        assert_eq!(Status::from_daemon(5, 0, false), Status::Idle);
        assert_eq!(Status::from_daemon(6, 0, false), Status::Seeding);
        assert_eq!(Status::from_daemon(6, 0, true), Status::Error);
        assert_eq!(Status::from_daemon(42, 0, false), Status::Idle);
    }

    #[test]
    fn test_error_string_marks_entry_as_error() {
        let mut rec = record(3, "broken", 6);
        rec.error_code = 3;
        let entry = TorrentEntry::from(rec.clone());
        assert_eq!(entry.status, Status::Error);
        assert_eq!(entry.error.as_deref(), Some("daemon error 3"));

        rec.error_string = "No data found".to_string();
        let entry = TorrentEntry::from(rec);
        assert_eq!(entry.error.as_deref(), Some("No data found"));
    }

    #[test]
    fn test_swarm_counts_ignore_unscraped_trackers() {
        let mut rec = record(1, "a", 6);
        rec.trackers = Some(vec![
            TrackerStat {
                host: "udp://one".to_string(),
                tier: 0,
                seeders: -1,
                leechers: -1,
                last_announce_result: String::new(),
            },
            TrackerStat {
                host: "udp://two".to_string(),
                tier: 1,
                seeders: 12,
                leechers: -1,
                last_announce_result: "Success".to_string(),
            },
        ]);
        let entry = TorrentEntry::from(rec);
        assert_eq!(entry.seeders, Some(12));
        assert_eq!(entry.leechers, None);
        assert!(matches!(entry.details.trackers, Section::Present(ref list) if list.len() == 2));

        let bare = TorrentEntry::from(record(2, "b", 6));
        assert_eq!(bare.seeders, None);
        assert_eq!(bare.details.trackers, Section::NotYetAvailable);
    }

    #[test]
    fn test_apply_snapshot_inserts_updates_removes() {
        let mut registry = Registry::new(SortOrder::default());
        let changes = registry.apply_snapshot(vec![record(2, "b", 6), record(1, "a", 6)]);
        assert_eq!(
            changes.changes,
            vec![(TorrentId(1), Change::Inserted), (TorrentId(2), Change::Inserted)]
        );

        let mut renamed = record(2, "b2", 6);
        renamed.raw = json!({ "id": 2, "name": "b2" });
        let changes = registry.apply_snapshot(vec![renamed, record(3, "c", 6)]);
        assert_eq!(
            changes.changes,
            vec![
                (TorrentId(1), Change::Removed),
                (TorrentId(2), Change::Updated(vec![Field::Name, Field::Raw])),
                (TorrentId(3), Change::Inserted),
            ]
        );
        assert!(changes.is_removed(TorrentId(1)));
        assert_eq!(ids(&registry), vec![2, 3]);
        assert_eq!(registry.get(TorrentId(2)).map(|e| e.name.as_str()), Some("b2"));
    }

    #[test]
    fn test_apply_snapshot_is_order_independent() {
        let forward = vec![record(1, "x", 6), record(2, "x", 6), record(3, "y", 4)];
        let mut reversed = forward.clone();
        reversed.reverse();

        let mut left = Registry::new(SortOrder::default());
        let mut right = Registry::new(SortOrder::default());
        let a = left.apply_snapshot(forward);
        let b = right.apply_snapshot(reversed);
        assert_eq!(a, b);
        assert_eq!(left.order(), right.order());
    }

    #[test]
    fn test_registry_tracks_last_snapshot_ids() {
        let snapshots: Vec<Vec<i64>> = vec![
            vec![1, 2, 3],
            vec![],
            vec![5, 1],
            vec![5, 1, 9, 7],
            vec![7],
            vec![2, 4, 6, 8],
        ];
        let mut registry = Registry::new(SortOrder::default());
        for ids_in in snapshots {
            let records = ids_in
                .iter()
                .map(|id| record(*id, &format!("t{id}"), 6))
                .collect();
            registry.apply_snapshot(records);
            let mut expected = ids_in.clone();
            expected.sort();
            assert_eq!(ids(&registry), expected);
            assert_eq!(registry.len(), expected.len());
        }
    }

    #[test]
    fn test_duplicate_ids_keep_last_record() {
        let mut registry = Registry::new(SortOrder::default());
        let changes = registry.apply_snapshot(vec![record(1, "first", 6), record(1, "second", 6)]);
        assert_eq!(changes.changes, vec![(TorrentId(1), Change::Inserted)]);
        assert_eq!(registry.get(TorrentId(1)).map(|e| e.name.as_str()), Some("second"));
    }

    #[test]
    fn test_unchanged_snapshot_is_quiet() {
        let mut registry = Registry::new(SortOrder::default());
        registry.apply_snapshot(vec![record(1, "a", 6)]);
        let changes = registry.apply_snapshot(vec![record(1, "a", 6)]);
        assert!(changes.is_quiet());
        assert_eq!(changes.changes, vec![(TorrentId(1), Change::Updated(vec![]))]);
    }

    #[test]
    fn test_formatters() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_speed(1024 * 1024), "1.0MiB/s");
        assert_eq!(format_eta(Eta::Known(Duration::from_secs(90_000))), "1d1h");
        assert_eq!(format_eta(Eta::Known(Duration::from_secs(3_720))), "1h2m");
        assert_eq!(format_eta(Eta::Known(Duration::from_secs(42))), "42s");
        assert_eq!(format_eta(Eta::Unknown), "-");
        assert_eq!(format_count(None), "?");
        assert_eq!(format_progress(0.5), " 50.0%");
    }
}
