//! Leadsync core library: lead row types, phone canonicalization, recency
//! windowing, time seams and configuration.
//!
//! - [`types`]: [`Row`], [`Field`], [`SheetRef`]
//! - [`phone`]: [`normalize_phone`]
//! - [`row`]: [`shape_row`]
//! - [`window`]: [`find_recent_start_index`] and date parsing
//! - [`clock`]: [`Clock`] / [`Sleeper`] seams
//! - [`config`]: [`Settings`] loaded from YAML + environment
//! - [`error`]: [`ConfigError`]

pub mod clock;
pub mod config;
pub mod error;
pub mod phone;
pub mod row;
pub mod types;
pub mod window;

pub use clock::{Clock, FixedClock, RecordingSleeper, Sleeper, SystemClock, ThreadSleeper};
pub use config::{CrmSettings, Settings, TelegramSettings, WindowSettings};
pub use error::ConfigError;
pub use phone::{normalize_phone, NormalizedPhone};
pub use row::shape_row;
pub use types::{Field, RawRow, Row, SheetRef, FIELD_COUNT};
pub use window::{find_recent_start_index, parse_lead_date, today_in};
