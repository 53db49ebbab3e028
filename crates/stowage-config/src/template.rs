//! Strftime expansion for path templates.

use std::fmt::{Display, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeDelta, TimeZone};

use crate::error::{ConfigError, ConfigResult};

/// Expand strftime placeholders in `template` against `now - rewind_seconds` in the
/// local time zone.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeTemplate`] when the template contains an invalid
/// placeholder, and [`ConfigError::InvalidField`] when the rewind is out of range.
pub fn expand_time_template(template: &str, rewind_seconds: i64) -> ConfigResult<String> {
    expand_time_template_at(template, rewind_seconds, &Local::now())
}

/// Expand strftime placeholders in `template` against `now - rewind_seconds`.
///
/// # Errors
///
/// See [`expand_time_template`].
pub fn expand_time_template_at<Tz>(
    template: &str,
    rewind_seconds: i64,
    now: &DateTime<Tz>,
) -> ConfigResult<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let invalid_rewind = || ConfigError::InvalidField {
        field: "rewind_seconds",
        value: Some(rewind_seconds.to_string()),
        reason: "out of range",
    };
    let rewind = TimeDelta::try_seconds(rewind_seconds).ok_or_else(invalid_rewind)?;
    let instant = now
        .clone()
        .checked_sub_signed(rewind)
        .ok_or_else(invalid_rewind)?;

    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimeTemplate {
            value: template.to_string(),
        });
    }

    let mut expanded = String::with_capacity(template.len() + 16);
    write!(expanded, "{}", instant.format_with_items(items.into_iter())).map_err(|_| {
        ConfigError::InvalidTimeTemplate {
            value: template.to_string(),
        }
    })?;
    Ok(expanded)
}
