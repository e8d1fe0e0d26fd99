//! Recording file names: `<n>_Recording_<timestamp>.wav`, numbered after the highest existing entry.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const TIMESTAMP_FORMAT: &str = "%d%b%y-%H%M%S";

fn number_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)_").expect("recording number regex should compile")
    })
}

/// Highest leading number among the entries of `dir`, or 0 when none is numbered.
pub fn last_recording_number(dir: &Path) -> Result<u64> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list recordings in {}", dir.display()))?;
    let mut last = 0;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to list recordings in {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        // Numbers too large for u64 are skipped rather than wrapping.
        if let Some(n) = number_prefix()
            .captures(name)
            .and_then(|caps| caps[1].parse::<u64>().ok())
        {
            last = last.max(n);
        }
    }
    Ok(last)
}

pub fn recording_file_name(number: u64, now: NaiveDateTime) -> String {
    format!("{number}_Recording_{}.wav", now.format(TIMESTAMP_FORMAT))
}

/// Path for the next recording in `dir`.
pub fn next_recording_path(dir: &Path, now: NaiveDateTime) -> Result<PathBuf> {
    let next = last_recording_number(dir)?.saturating_add(1);
    Ok(dir.join(recording_file_name(next, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn file_name_uses_day_month_year_time() {
        assert_eq!(
            recording_file_name(4, at(9, 5, 3)),
            "4_Recording_07Mar24-090503.wav"
        );
    }

    #[test]
    fn empty_directory_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = next_recording_path(dir.path(), at(12, 0, 0)).unwrap();
        assert_eq!(path, dir.path().join("1_Recording_07Mar24-120000.wav"));
    }

    #[test]
    fn numbering_follows_highest_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2_Recording_01Jan24-000000.wav",
            "10_Recording_02Jan24-000000.wav",
            "7_notes.txt",
            "greeting.wav",
            "_3_missing_digits.wav",
            "11-dash.wav",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("12_archive")).unwrap();

        assert_eq!(last_recording_number(dir.path()).unwrap(), 12);
        let path = next_recording_path(dir.path(), at(8, 30, 0)).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "13_Recording_07Mar24-083000.wav"
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = next_recording_path(&dir.path().join("nope"), at(0, 0, 0)).unwrap_err();
        assert!(err.to_string().contains("failed to list recordings"));
    }
}
