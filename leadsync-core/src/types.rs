//! Domain types for lead rows and dataset references.
//!
//! Row field order is positional, never header-driven:
//! `[date, lead_number, name, phone, comment, additional_comment, audio_link]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phone::NormalizedPhone;
use crate::row::shape_row;

/// Number of fields every processed row carries (columns A–G).
pub const FIELD_COUNT: usize = 7;

/// A row exactly as read from a remote dataset: any number of cells.
pub type RawRow = Vec<String>;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Positional lead fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    LeadNumber,
    Name,
    Phone,
    Comment,
    AdditionalComment,
    AudioLink,
}

impl Field {
    /// Zero-based column index of this field.
    pub fn index(self) -> usize {
        match self {
            Field::Date => 0,
            Field::LeadNumber => 1,
            Field::Name => 2,
            Field::Phone => 3,
            Field::Comment => 4,
            Field::AdditionalComment => 5,
            Field::AudioLink => 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// A lead record shaped to exactly [`FIELD_COUNT`] fields.
///
/// The only constructors go through [`shape_row`], so the width invariant
/// holds for every value of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row(Vec<String>);

impl Row {
    /// Shape an arbitrary-width raw row into a [`Row`].
    pub fn shape(raw: &[String]) -> Self {
        Self(shape_row(raw, FIELD_COUNT))
    }

    /// Build a row from any iterator of string-like cells, shaping as needed.
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = cells.into_iter().map(Into::into).collect();
        Self::shape(&raw)
    }

    pub fn get(&self, field: Field) -> &str {
        &self.0[field.index()]
    }

    pub fn date(&self) -> &str {
        self.get(Field::Date)
    }

    pub fn lead_number(&self) -> &str {
        self.get(Field::LeadNumber)
    }

    pub fn name(&self) -> &str {
        self.get(Field::Name)
    }

    pub fn phone(&self) -> &str {
        self.get(Field::Phone)
    }

    pub fn comment(&self) -> &str {
        self.get(Field::Comment)
    }

    pub fn additional_comment(&self) -> &str {
        self.get(Field::AdditionalComment)
    }

    pub fn audio_link(&self) -> &str {
        self.get(Field::AudioLink)
    }

    /// Replace the phone field with its canonical form. Other fields keep
    /// their position and content.
    pub fn with_phone(mut self, phone: &NormalizedPhone) -> Self {
        self.0[Field::Phone.index()] = phone.as_str().to_owned();
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<String> {
        self.0
    }
}

impl AsRef<[String]> for Row {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// SheetRef
// ---------------------------------------------------------------------------

/// Address of a tabular dataset: an opaque spreadsheet id plus an A1 range
/// (usually just the tab name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetRef {
    pub spreadsheet_id: String,
    pub range: String,
}

impl SheetRef {
    pub fn new(spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
        }
    }

    /// A reference to `cells` (e.g. `A1:G1`) on the same tab.
    ///
    /// The tab part is whatever precedes `!` in the current range; it is
    /// quoted so tab names with spaces or Cyrillic survive A1 parsing.
    pub fn cells(&self, cells: &str) -> Self {
        let tab = self
            .range
            .split_once('!')
            .map_or(self.range.as_str(), |(tab, _)| tab);
        let tab = tab.trim_matches('\'').replace("''", "'");
        Self {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: format!("'{}'!{cells}", tab.replace('\'', "''")),
        }
    }

    /// Shortened id for log lines.
    pub fn short_id(&self) -> &str {
        let end = self
            .spreadsheet_id
            .char_indices()
            .nth(10)
            .map_or(self.spreadsheet_id.len(), |(i, _)| i);
        &self.spreadsheet_id[..end]
    }
}

impl fmt::Display for SheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}...)", self.range, self.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::normalize_phone;

    #[test]
    fn accessors_follow_positional_order() {
        let row = Row::from_cells(["2025-01-01", "17", "Ann", "89120000001", "hi", "more", "http://a"]);
        assert_eq!(row.date(), "2025-01-01");
        assert_eq!(row.lead_number(), "17");
        assert_eq!(row.name(), "Ann");
        assert_eq!(row.phone(), "89120000001");
        assert_eq!(row.comment(), "hi");
        assert_eq!(row.additional_comment(), "more");
        assert_eq!(row.audio_link(), "http://a");
    }

    #[test]
    fn with_phone_rewrites_only_the_phone_field() {
        let row = Row::from_cells(["d", "n", "Ann", "8 912 000-00-01"]);
        let phone = normalize_phone(row.phone()).expect("valid phone");
        let rewritten = row.clone().with_phone(&phone);
        assert_eq!(rewritten.phone(), "79120000001");
        for field in [Field::Date, Field::LeadNumber, Field::Name, Field::Comment, Field::AudioLink] {
            assert_eq!(rewritten.get(field), row.get(field));
        }
    }

    #[test]
    fn from_cells_shapes_to_field_count() {
        let row = Row::from_cells(["a", "b"]);
        assert_eq!(row.fields().len(), FIELD_COUNT);
        assert_eq!(row.into_fields(), vec!["a", "b", "", "", "", "", ""]);
    }

    #[test]
    fn cells_quotes_tab_and_replaces_existing_cells() {
        let sheet = SheetRef::new("abc", "Лиды 2025");
        assert_eq!(sheet.cells("A1:G1").range, "'Лиды 2025'!A1:G1");

        let sheet = SheetRef::new("abc", "'O''Neil'!A:G");
        assert_eq!(sheet.cells("A1:G1").range, "'O''Neil'!A1:G1");
    }

    #[test]
    fn short_id_truncates_long_ids_on_char_boundary() {
        let sheet = SheetRef::new("1AbCdEfGhIjKlMn", "Leads");
        assert_eq!(sheet.short_id(), "1AbCdEfGhI");
        let sheet = SheetRef::new("short", "Leads");
        assert_eq!(sheet.short_id(), "short");
    }
}
