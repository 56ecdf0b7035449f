//! Tera rendering engine for lead messages.
//!
//! | Template              | Used by        | Escaping             |
//! |-----------------------|----------------|----------------------|
//! | `telegram/lead.md`    | [`Notifier`]   | MarkdownV2 per value |
//! | `crm/comments.txt`    | [`LeadUploader`] | none               |
//!
//! [`Notifier`]: crate::telegram::Notifier
//! [`LeadUploader`]: crate::crm::LeadUploader

use std::collections::HashMap;

use tera::{Tera, Value};

use crate::context::LeadContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("telegram/lead.md", include_str!("templates/telegram_lead.md.tera")),
    ("crm/comments.txt", include_str!("templates/crm_comments.txt.tera")),
];

/// Characters Telegram MarkdownV2 requires escaping outside entities.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Backslash-escape every MarkdownV2 special character in `text`.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn md_escape_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(escape_markdown_v2(s))),
        Value::Null => Ok(Value::String(String::new())),
        other => Ok(Value::String(escape_markdown_v2(&other.to_string()))),
    }
}

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.register_filter("md_escape", md_escape_filter);
    tera.add_raw_templates(TPLS.iter().copied())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// The message kinds this crate renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    TelegramLead,
    CrmComments,
}

impl Template {
    pub fn name(self) -> &'static str {
        match self {
            Template::TelegramLead => "telegram/lead.md",
            Template::CrmComments => "crm/comments.txt",
        }
    }
}

/// Renders lead messages from the embedded templates. Create once and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera()? })
    }

    /// Render `template` for one lead. Trailing newlines are trimmed.
    pub fn render(&self, template: Template, lead: &LeadContext) -> Result<String, RenderError> {
        let ctx = lead.to_tera_context()?;
        let rendered = self.tera.render(template.name(), &ctx)?;
        Ok(rendered.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PLACEHOLDER;
    use leadsync_core::Row;
    use rstest::rstest;

    fn lead() -> LeadContext {
        LeadContext::from_row(&Row::from_cells([
            "2025-01-01",
            "17",
            "Ann-Marie",
            "79120000001",
            "call after 18:00!",
            "",
            "https://rec.example/a_1.mp3",
        ]))
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a.b", "a\\.b")]
    #[case("snake_case", "snake\\_case")]
    #[case("(1+1=2)!", "\\(1\\+1\\=2\\)\\!")]
    #[case("back\\slash", "back\\\\slash")]
    #[case("Имя", "Имя")]
    fn escapes_markdown_v2(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn telegram_message_escapes_values_and_keeps_markup() {
        let renderer = Renderer::new().expect("renderer");
        let text = renderer
            .render(Template::TelegramLead, &lead().with_placeholder(PLACEHOLDER))
            .expect("render");
        assert!(text.starts_with("🆕 *Новый лид: Ann\\-Marie\\_79120000001*"));
        assert!(text.contains("💬 *Комментарий:* call after 18:00\\!"));
        assert!(text.contains(&format!("📝 *Доп\\. комментарий:* {PLACEHOLDER}")));
        assert!(text.contains("https://rec\\.example/a\\_1\\.mp3"));
        assert!(text.ends_with("📅 *Дата лида:* 2025\\-01\\-01"));
    }

    #[test]
    fn crm_comment_is_unescaped_plain_text() {
        let renderer = Renderer::new().expect("renderer");
        let text = renderer.render(Template::CrmComments, &lead()).expect("render");
        assert_eq!(
            text,
            "Имя: Ann-Marie\n\
             Телефон: 79120000001\n\
             Комментарий: call after 18:00!\n\
             Доп. комментарий: \n\
             Ссылка на запись: https://rec.example/a_1.mp3\n\
             Дата лида: 2025-01-01"
        );
    }
}
