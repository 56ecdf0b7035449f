//! Phone-keyed deduplication of source rows against the destination window.

use std::collections::HashSet;

use serde::Serialize;

use leadsync_core::{normalize_phone, Field, NormalizedPhone, Row};

/// Canonical phones already present in `rows`.
///
/// Rows without a recognizable phone contribute nothing, so raw spellings
/// like `8 912 ...` and `+7912...` collapse onto the same key.
pub fn existing_phone_set<R: AsRef<[String]>>(rows: &[R]) -> HashSet<NormalizedPhone> {
    rows.iter()
        .filter_map(|row| row.as_ref().get(Field::Phone.index()))
        .filter_map(|cell| normalize_phone(cell.trim()))
        .collect()
}

/// Per-reason counters for one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub scanned: usize,
    pub accepted: usize,
    pub no_phone: usize,
    pub invalid_phone: usize,
    pub duplicate: usize,
}

impl DedupStats {
    pub fn rejected(&self) -> usize {
        self.no_phone + self.invalid_phone + self.duplicate
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Accepted rows in source order, phone rewritten to canonical form.
    pub rows: Vec<Row>,
    pub stats: DedupStats,
}

/// Keep the rows of `candidates` whose normalized phone is neither in
/// `existing` nor already accepted earlier in the same batch.
pub fn filter_new_rows<R: AsRef<[String]>>(
    candidates: &[R],
    existing: &HashSet<NormalizedPhone>,
) -> DedupOutcome {
    let mut stats = DedupStats {
        scanned: candidates.len(),
        ..DedupStats::default()
    };
    let mut seen: HashSet<NormalizedPhone> = HashSet::new();
    let mut rows = Vec::new();

    for (offset, candidate) in candidates.iter().enumerate() {
        let row = Row::shape(candidate.as_ref());
        let raw_phone = row.phone().trim();
        if raw_phone.is_empty() {
            tracing::debug!(offset, "skipping row without phone");
            stats.no_phone += 1;
            continue;
        }
        let Some(phone) = normalize_phone(raw_phone) else {
            tracing::debug!(offset, phone = raw_phone, "skipping row with unrecognized phone");
            stats.invalid_phone += 1;
            continue;
        };
        if existing.contains(&phone) || seen.contains(&phone) {
            tracing::debug!(offset, phone = %phone, "skipping duplicate lead");
            stats.duplicate += 1;
            continue;
        }
        seen.insert(phone.clone());
        rows.push(row.with_phone(&phone));
    }

    stats.accepted = rows.len();
    tracing::info!(
        scanned = stats.scanned,
        accepted = stats.accepted,
        no_phone = stats.no_phone,
        invalid_phone = stats.invalid_phone,
        duplicate = stats.duplicate,
        "deduplicated source window"
    );
    DedupOutcome { rows, stats }
}
