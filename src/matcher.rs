//! Fuzzy path matching between imported rows and stored tracks.
//!
//! MusicBee and Navidrome each hold their own absolute path for the same
//! file, usually under different library roots (a Windows drive vs a
//! server mount). Matching therefore compares paths from the deepest
//! segment outward: the filename must agree exactly, then parent folders
//! are scored pairwise until the first disagreement. The two roots are
//! allowed to differ; the folder structure nearest the file is not.

use crate::import::ImportRecord;
use crate::model::TrackMatch;

/// Split a path on both separators, deepest segment first.
fn reversed_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).rev().collect()
}

/// Find the stored track whose path best matches the imported row.
///
/// A candidate whose filename differs from the import's is rejected
/// outright. Otherwise folders are compared pairwise walking upward and
/// scoring stops at the first mismatch. The strictly highest score wins;
/// ties keep the first-seen candidate; no candidates or no folder in
/// common yields `None`.
pub fn find_best_match<'a>(
    record: &ImportRecord,
    candidates: &'a [TrackMatch],
) -> Option<&'a TrackMatch> {
    let mut import_segments = reversed_segments(&record.file_path);
    import_segments.insert(0, record.filename.as_str());

    let mut best_match: Option<&TrackMatch> = None;
    let mut best_score = 0usize;

    for candidate in candidates {
        let candidate_segments = reversed_segments(&candidate.path);

        if import_segments.first() != candidate_segments.first() {
            continue;
        }

        let mut score = 0usize;
        for i in 1..import_segments.len().min(candidate_segments.len()) {
            if import_segments[i] == candidate_segments[i] {
                score += 1;
            } else {
                break;
            }
        }

        if score > best_score {
            best_score = score;
            best_match = Some(candidate);
        }
    }

    best_match
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_path: &str, filename: &str) -> ImportRecord {
        ImportRecord {
            title: String::new(),
            filename: filename.to_string(),
            file_path: file_path.to_string(),
            play_count: 0,
            rating: 0,
            loved: false,
            last_played: None,
            skip_count: 0,
        }
    }

    fn candidate(id: &str, path: &str) -> TrackMatch {
        TrackMatch {
            id: id.to_string(),
            path: path.to_string(),
            title: String::new(),
            album_id: None,
            artist_id: None,
            annotation_play_count: None,
            annotation_play_date: None,
            annotation_rating: None,
            annotation_starred: None,
            annotation_starred_at: None,
        }
    }

    #[test]
    fn test_prefers_candidate_with_longest_folder_agreement() {
        let rec = record(
            r"V:\data\media\music\Soundtracks Author\Carpenter Brut\Carpenter Brut - 2018 - Leather Teeth",
            "01 - Leather Teeth.mp3",
        );
        let candidates = vec![
            candidate(
                "wrong",
                "/music/lidarr/Electro Retrowave/Carpenter Brut/Carpenter Brut - 2018 - Leather Teeth/01 - Leather Teeth.mp3",
            ),
            candidate(
                "right",
                "/music/lidarr/Soundtracks Author/Carpenter Brut/Carpenter Brut - 2018 - Leather Teeth/01 - Leather Teeth.mp3",
            ),
        ];
        assert_eq!(find_best_match(&rec, &candidates).unwrap().id, "right");
    }

    #[test]
    fn test_tolerates_paths_of_different_depths() {
        let rec = record(r"V:\data\media\music\Short Path", "File.mp3");
        let candidates = vec![
            candidate("deep", "/music/whatever/longer/length/Short Path/File.mp3"),
            candidate("other", "/music/lidarr/Short Path/Another File.mp3"),
        ];
        assert_eq!(find_best_match(&rec, &candidates).unwrap().id, "deep");
    }

    #[test]
    fn test_filename_mismatch_rejects_candidate() {
        let rec = record(r"V:\data\media\music\Nonexistent Path", "Nonexistent File.mp3");
        let candidates = vec![candidate(
            "c1",
            "/music/lidarr/Some Album/01 - Leather Teeth.mp3",
        )];
        assert!(find_best_match(&rec, &candidates).is_none());
    }

    #[test]
    fn test_same_filename_but_no_folder_agreement_is_no_match() {
        let rec = record(r"V:\data\media\music\Nonexistent Path", "01 - Leather Teeth.mp3");
        let candidates = vec![candidate(
            "c1",
            "/music/lidarr/Carpenter Brut/Leather Teeth/01 - Leather Teeth.mp3",
        )];
        assert!(find_best_match(&rec, &candidates).is_none());
    }

    #[test]
    fn test_mismatch_stops_scoring_even_if_later_segments_agree() {
        // Both agree on the album folder; "a" then diverges at the artist
        // folder but re-converges above it. The break must ignore the
        // re-convergence, so "b" (two unbroken matches) wins.
        let rec = record("music/Artist/Album", "song.mp3");
        let candidates = vec![
            candidate("a", "music/Other/Album/song.mp3"),
            candidate("b", "library/Artist/Album/song.mp3"),
        ];
        assert_eq!(find_best_match(&rec, &candidates).unwrap().id, "b");
    }

    #[test]
    fn test_tie_keeps_first_seen_candidate() {
        let rec = record("music/Artist/Album", "song.mp3");
        let candidates = vec![
            candidate("first", "mount/Artist/Album/song.mp3"),
            candidate("second", "other/Artist/Album/song.mp3"),
        ];
        assert_eq!(find_best_match(&rec, &candidates).unwrap().id, "first");
    }

    #[test]
    fn test_empty_candidates() {
        let rec = record("music/Artist/Album", "song.mp3");
        assert!(find_best_match(&rec, &[]).is_none());
    }
}
