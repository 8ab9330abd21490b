//! Session detection boundary tests
//!
//! Each threshold is checked on both sides of its boundary.

use std::collections::HashMap;

use albumlog_sync::detection::{
    detect_album_listen_sessions, detect_all_album_listens, group_plays_by_album, MAX_SESSION_DURATION_MS,
};
use albumlog_sync::models::PlayEvent;

const MINUTE: i64 = 60 * 1000;

fn play(album: &str, track_number: i64, played_at: i64) -> PlayEvent {
    PlayEvent {
        track_id: format!("{}-t{}", album, track_number),
        track_number,
        played_at,
        album_id: album.to_string(),
    }
}

/// Plays of the given track numbers, one every four minutes
fn sequence(album: &str, track_numbers: &[i64]) -> Vec<PlayEvent> {
    track_numbers
        .iter()
        .enumerate()
        .map(|(i, &n)| play(album, n, i as i64 * 4 * MINUTE))
        .collect()
}

#[test]
fn test_albums_under_four_tracks_never_count() {
    let plays = sequence("ep", &[1, 2, 3]);
    assert!(detect_album_listen_sessions(&plays, 3).is_empty());
}

#[test]
fn test_four_track_album_counts() {
    let plays = sequence("ep", &[1, 2, 3, 4]);
    assert_eq!(detect_album_listen_sessions(&plays, 4).len(), 1);
}

#[test]
fn test_majority_boundary() {
    let seven = sequence("a", &[1, 2, 3, 4, 5, 6, 7]);
    let six = sequence("a", &[1, 2, 3, 4, 5, 6]);

    assert_eq!(detect_album_listen_sessions(&seven, 10).len(), 1);
    assert!(detect_album_listen_sessions(&six, 10).is_empty());
}

#[test]
fn test_repeated_tracks_count_once_for_majority() {
    let plays = sequence("a", &[1, 2, 2, 3, 3, 4, 5, 6]);
    assert!(detect_album_listen_sessions(&plays, 10).is_empty());
}

#[test]
fn test_duration_boundary() {
    let mut exactly_four_hours: Vec<PlayEvent> = (1..=9).map(|n| play("a", n, (n - 1) * MINUTE)).collect();
    exactly_four_hours.push(play("a", 10, MAX_SESSION_DURATION_MS));

    let mut just_over: Vec<PlayEvent> = (1..=9).map(|n| play("a", n, (n - 1) * MINUTE)).collect();
    just_over.push(play("a", 10, MAX_SESSION_DURATION_MS + 1));

    let accepted = detect_album_listen_sessions(&exactly_four_hours, 10);
    assert_eq!(accepted.len(), 1);
    assert_eq!(
        accepted[0].latest_played_at - accepted[0].earliest_played_at,
        MAX_SESSION_DURATION_MS
    );

    assert!(detect_album_listen_sessions(&just_over, 10).is_empty());
}

#[test]
fn test_ascending_boundary() {
    // Two descending pairs out of nine: 7/9 ascending
    let mostly_ordered = sequence("a", &[1, 2, 3, 5, 4, 6, 8, 7, 9, 10]);
    // Three descending pairs out of nine: 6/9 ascending
    let shuffled = sequence("a", &[2, 1, 3, 5, 4, 6, 8, 7, 9, 10]);

    assert_eq!(detect_album_listen_sessions(&mostly_ordered, 10).len(), 1);
    assert!(detect_album_listen_sessions(&shuffled, 10).is_empty());
}

#[test]
fn test_restart_to_early_track_splits() {
    // 9 → 2 is a restart; the trailing single play is not a listen
    let plays = sequence("a", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 2]);
    let sessions = detect_album_listen_sessions(&plays, 10);

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].track_ids.len(), 9);
    assert_eq!(sessions[0].latest_played_at, 8 * 4 * MINUTE);
}

#[test]
fn test_jump_to_middle_track_does_not_split() {
    // 9 → 5 stays in the same session
    let plays = sequence("a", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 5]);
    let sessions = detect_album_listen_sessions(&plays, 10);

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].track_ids.len(), 9);
    assert_eq!(sessions[0].latest_played_at, 9 * 4 * MINUTE);
}

#[test]
fn test_two_passes_give_two_sessions_in_order() {
    let mut plays = sequence("a", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    let offset = 60 * MINUTE;
    plays.extend(
        sequence("a", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
            .into_iter()
            .map(|p| PlayEvent {
                played_at: p.played_at + offset,
                ..p
            }),
    );

    let sessions = detect_album_listen_sessions(&plays, 10);
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].latest_played_at < sessions[1].earliest_played_at);
}

#[test]
fn test_equal_timestamps_keep_input_order() {
    let mut plays = sequence("a", &[1, 2, 3, 4, 5, 6, 7, 8]);
    plays[3].played_at = plays[2].played_at;

    let in_order = detect_album_listen_sessions(&plays, 8);
    assert_eq!(in_order[0].track_ids[2], "a-t3");
    assert_eq!(in_order[0].track_ids[3], "a-t4");

    plays.swap(2, 3);
    let swapped = detect_album_listen_sessions(&plays, 8);
    assert_eq!(swapped[0].track_ids[2], "a-t4");
    assert_eq!(swapped[0].track_ids[3], "a-t3");
}

#[test]
fn test_interleaved_albums_each_get_a_session() {
    let mut plays = Vec::new();
    for n in 1..=10 {
        plays.push(play("a", n, n * 2 * MINUTE));
        plays.push(play("b", n, n * 2 * MINUTE + MINUTE));
    }

    let totals = HashMap::from([("a".to_string(), 10), ("b".to_string(), 10)]);
    let sessions = detect_all_album_listens(&plays, &totals);

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].album_id, "a");
    assert_eq!(sessions[1].album_id, "b");
    assert!(sessions.iter().all(|s| s.track_ids.len() == 10));
}

#[test]
fn test_grouping_follows_first_appearance() {
    let plays = vec![play("b", 1, 10), play("a", 1, 20), play("b", 2, 30)];
    let groups = group_plays_by_album(plays);

    assert_eq!(groups.album_ids().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(groups.get("b").map(|p| p.len()), Some(2));
}

#[test]
fn test_extreme_timestamps_are_rejected_not_overflowed() {
    let plays = vec![
        play("a", 1, i64::MIN),
        play("a", 2, 0),
        play("a", 3, 1),
        play("a", 4, i64::MAX),
    ];
    assert!(detect_album_listen_sessions(&plays, 4).is_empty());

    let near_max: Vec<PlayEvent> = (1..=4).map(|n| play("a", n, i64::MAX - (4 - n) * MINUTE)).collect();
    assert_eq!(detect_album_listen_sessions(&near_max, 4).len(), 1);
}
