//! Naming for per-commit virtualenvs and their dated aliases.
//!
//! Every commit gets one directory, `<venv_dir>/<sha>`, created once and
//! never rebuilt. Each build also adds an alias symlink named
//! `<YYYY-MM-DD>.<N>` so operators can tell builds apart by day. `N`
//! counts the aliases already present for that day, starting at 0.

use chrono::NaiveDate;
use std::collections::BTreeSet;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Next alias for `today` given the current venv dir entries.
///
/// The index is the number of aliases already present for `today`. If a
/// manual deletion left a gap and that name is taken, the next free index
/// is used.
pub fn alias_name<S: AsRef<str>>(today: NaiveDate, entries: &[S]) -> String {
    let date = today.format(DATE_FORMAT).to_string();
    let taken: BTreeSet<u32> = entries
        .iter()
        .filter_map(|e| alias_index(e.as_ref(), &date))
        .collect();

    let mut n = taken.len() as u32;
    while taken.contains(&n) {
        n += 1;
    }
    format!("{}.{}", date, n)
}

fn alias_index(entry: &str, date: &str) -> Option<u32> {
    let suffix = entry.strip_prefix(date)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Split an alias into its date and index. Commit directories and other
/// entries return None.
pub fn parse_alias(entry: &str) -> Option<(NaiveDate, u32)> {
    let (date, _) = entry.rsplit_once('.')?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((date, alias_index(entry, &date.format(DATE_FORMAT).to_string())?))
}

/// Resolve a venv argument: absolute paths pass through, anything else
/// is taken relative to `venv_dir`.
pub fn resolve(venv_dir: &str, venv: &str) -> String {
    if venv.starts_with('/') {
        venv.to_string()
    } else {
        format!("{}/{}", venv_dir.trim_end_matches('/'), venv)
    }
}
