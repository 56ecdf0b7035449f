//! Row shaping: force a record to a fixed field width.

/// Truncate `row` to `width` fields, or right-pad it with empty strings.
///
/// Never fails; the result always has exactly `width` fields.
pub fn shape_row(row: &[String], width: usize) -> Vec<String> {
    let mut shaped: Vec<String> = row.iter().take(width).cloned().collect();
    shaped.resize(width, String::new());
    shaped
}
