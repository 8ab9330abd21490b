//! Album listen detection
//!
//! Detects "straight through" album listens from the plays of one album:
//!
//! 1. Plays are sorted by time and split wherever the listener jumped from
//!    late in the album back to its first tracks (a restart).
//! 2. Each candidate run must cover most of the album, fit inside a
//!    four-hour window, and play mostly in ascending track order.
//! 3. Surviving runs become [`ListenSession`]s.
//!
//! Everything here is pure: no I/O, no clock, deterministic for its inputs.
//! Malformed input (zero or negative track numbers) goes through the same
//! arithmetic rather than being rejected.

use std::collections::{HashMap, HashSet};

use crate::models::{ListenSession, PlayEvent};

/// Fraction of the album's tracks a session must contain
pub const MAJORITY_THRESHOLD: f64 = 0.7;

/// Fraction of consecutive play pairs that must be in ascending track order
pub const ASCENDING_THRESHOLD: f64 = 0.7;

/// Longest span between the first and last play of a session (4 hours)
pub const MAX_SESSION_DURATION_MS: i64 = 4 * 60 * 60 * 1000;

/// Jumping to this track number or lower can start a new pass
pub const RESTART_FROM_TRACK: i64 = 3;

/// ...if the previous play was at least this far through the album
pub const RESTART_AFTER_TRACK_PERCENT: f64 = 0.7;

/// Singles and EPs never count as album listens
pub const MIN_ALBUM_TRACKS: u32 = 4;

/// Plays grouped by album id, albums in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumGroups {
    groups: Vec<(String, Vec<PlayEvent>)>,
}

impl AlbumGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PlayEvent])> {
        self.groups
            .iter()
            .map(|(album_id, plays)| (album_id.as_str(), plays.as_slice()))
    }

    pub fn album_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(album_id, _)| album_id.as_str())
    }

    pub fn get(&self, album_id: &str) -> Option<&[PlayEvent]> {
        self.groups
            .iter()
            .find(|(id, _)| id == album_id)
            .map(|(_, plays)| plays.as_slice())
    }
}

impl FromIterator<PlayEvent> for AlbumGroups {
    fn from_iter<I: IntoIterator<Item = PlayEvent>>(plays: I) -> Self {
        group_plays_by_album(plays)
    }
}

/// Group plays by album id
///
/// Albums keep the order in which they first appear; plays keep input order
/// within their album.
pub fn group_plays_by_album<I>(plays: I) -> AlbumGroups
where
    I: IntoIterator<Item = PlayEvent>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<PlayEvent>)> = Vec::new();

    for play in plays {
        match index.get(&play.album_id) {
            Some(&slot) => groups[slot].1.push(play),
            None => {
                index.insert(play.album_id.clone(), groups.len());
                groups.push((play.album_id.clone(), vec![play]));
            }
        }
    }

    AlbumGroups { groups }
}

/// Lowest track number that counts as "late in the album"
fn restart_after_track(total_tracks: u32) -> i64 {
    (total_tracks as f64 * RESTART_AFTER_TRACK_PERCENT).ceil() as i64
}

/// Late track followed by one of the first few tracks
fn is_restart(prev_track_number: i64, curr_track_number: i64, restart_after: i64) -> bool {
    prev_track_number >= restart_after && curr_track_number <= RESTART_FROM_TRACK
}

/// Partition time-sorted plays into candidate sessions at every restart
fn split_into_sessions<'s, 'p>(
    sorted: &'s [&'p PlayEvent],
    total_tracks: u32,
) -> Vec<&'s [&'p PlayEvent]> {
    let restart_after = restart_after_track(total_tracks);
    let mut sessions = Vec::new();
    let mut start = 0;

    for i in 1..sorted.len() {
        if is_restart(sorted[i - 1].track_number, sorted[i].track_number, restart_after) {
            sessions.push(&sorted[start..i]);
            start = i;
        }
    }

    if start < sorted.len() {
        sessions.push(&sorted[start..]);
    }

    sessions
}

/// At least 70% of consecutive pairs keep or advance the track number
fn is_mostly_ascending(session: &[&PlayEvent]) -> bool {
    if session.len() <= 1 {
        return true;
    }

    let total_pairs = session.len() - 1;
    let ascending_pairs = session
        .windows(2)
        .filter(|pair| pair[1].track_number >= pair[0].track_number)
        .count();

    ascending_pairs as f64 / total_pairs as f64 >= ASCENDING_THRESHOLD
}

/// (min, max) of `played_at`
fn played_at_bounds(session: &[&PlayEvent]) -> Option<(i64, i64)> {
    let earliest = session.iter().map(|p| p.played_at).min()?;
    let latest = session.iter().map(|p| p.played_at).max()?;
    Some((earliest, latest))
}

fn is_valid_session(session: &[&PlayEvent], total_tracks: u32) -> bool {
    let Some((earliest, latest)) = played_at_bounds(session) else {
        return false;
    };

    // Repeats of a track count once
    let unique_tracks: HashSet<&str> = session.iter().map(|p| p.track_id.as_str()).collect();
    if (unique_tracks.len() as f64) < total_tracks as f64 * MAJORITY_THRESHOLD {
        return false;
    }

    if latest.abs_diff(earliest) > MAX_SESSION_DURATION_MS as u64 {
        return false;
    }

    is_mostly_ascending(session)
}

fn to_listen_session(session: &[&PlayEvent]) -> Option<ListenSession> {
    let first = session.first()?;
    let (earliest, latest) = played_at_bounds(session)?;

    let mut seen = HashSet::new();
    let track_ids = session
        .iter()
        .filter(|p| seen.insert(p.track_id.as_str()))
        .map(|p| p.track_id.clone())
        .collect();

    Some(ListenSession {
        album_id: first.album_id.clone(),
        track_ids,
        earliest_played_at: earliest,
        latest_played_at: latest,
    })
}

/// Detect valid listen sessions in the plays of a single album
///
/// # Arguments
/// * `plays` - Play events, all for the same album, in any order
/// * `total_tracks` - Number of tracks on the album
///
/// # Returns
/// Valid sessions in chronological order. Plays with equal timestamps keep
/// their input order (stable sort).
pub fn detect_album_listen_sessions(plays: &[PlayEvent], total_tracks: u32) -> Vec<ListenSession> {
    if plays.is_empty() || total_tracks == 0 || total_tracks < MIN_ALBUM_TRACKS {
        return Vec::new();
    }

    let mut sorted: Vec<&PlayEvent> = plays.iter().collect();
    sorted.sort_by_key(|p| p.played_at);

    split_into_sessions(&sorted, total_tracks)
        .into_iter()
        .filter(|session| is_valid_session(session, total_tracks))
        .filter_map(to_listen_session)
        .collect()
}

/// Detect listen sessions across a batch that mixes albums
///
/// Albums missing from `album_total_tracks` (metadata could not be resolved)
/// are skipped. Sessions come out album by album, in grouping order.
pub fn detect_all_album_listens(
    plays: &[PlayEvent],
    album_total_tracks: &HashMap<String, u32>,
) -> Vec<ListenSession> {
    let groups = group_plays_by_album(plays.iter().cloned());

    groups
        .iter()
        .filter_map(|(album_id, album_plays)| {
            album_total_tracks
                .get(album_id)
                .map(|&total| detect_album_listen_sessions(album_plays, total))
        })
        .flatten()
        .collect()
}
