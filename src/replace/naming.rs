use chrono::{DateTime, Utc};

use crate::constants::REPLACEMENT_TIMESTAMP_FORMAT;

/// Name for the replacement of `current` on backends that need a fresh name per
/// creation: the final `_` segment is swapped for a timestamp, or one is appended
/// when the name has no `_`.
///
/// `opsman_20240101` becomes `opsman_20250316093000`; `opsman` becomes
/// `opsman_20250316093000`.
pub fn derive_replacement_name(current: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format(REPLACEMENT_TIMESTAMP_FORMAT);
    match current.rsplit_once('_') {
        Some((base, _)) => format!("{base}_{stamp}"),
        None => format!("{current}_{stamp}"),
    }
}
