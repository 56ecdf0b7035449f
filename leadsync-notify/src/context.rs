//! Template context built from a lead [`Row`].

use serde::Serialize;

use leadsync_core::Row;

use crate::error::RenderError;

/// Shown in chat messages in place of an empty field.
pub const PLACEHOLDER: &str = "Не указано";

/// Named view of a row's fields, as templates see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadContext {
    pub date: String,
    pub lead_number: String,
    pub name: String,
    pub phone: String,
    pub comment: String,
    pub additional_comment: String,
    pub audio_link: String,
}

impl LeadContext {
    pub fn from_row(row: &Row) -> Self {
        Self {
            date: row.date().to_owned(),
            lead_number: row.lead_number().to_owned(),
            name: row.name().to_owned(),
            phone: row.phone().to_owned(),
            comment: row.comment().to_owned(),
            additional_comment: row.additional_comment().to_owned(),
            audio_link: row.audio_link().to_owned(),
        }
    }

    /// Replace blank fields with `placeholder`.
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        for field in [
            &mut self.date,
            &mut self.lead_number,
            &mut self.name,
            &mut self.phone,
            &mut self.comment,
            &mut self.additional_comment,
            &mut self.audio_link,
        ] {
            if field.trim().is_empty() {
                *field = placeholder.to_owned();
            }
        }
        self
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}
