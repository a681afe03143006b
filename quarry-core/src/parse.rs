use crate::{Error, Result, truncate_long};
use anyhow::Context;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::well_known::Rfc3339,
    macros::{format_description, offset},
};

pub fn parse_date(value: &str) -> Result<Date> {
    let value = value.trim();
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .or_else(|_| parse_timestamp(value).map(|v| v.date()))
        .with_context(|| format!("Cannot parse `{}` as a date", truncate_long!(value)))
}

fn parse_primitive(value: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ))
    .or(PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ))
    .map_err(Error::new)
}

/// Parse a point in time. Values without an offset are taken as UTC, a bare date is
/// midnight UTC.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    let value = value.trim();
    OffsetDateTime::parse(value, &Rfc3339)
        .or(OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .or(OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .map_err(Error::new)
        .or_else(|_| parse_primitive(value).map(|v| v.assume_utc()))
        .or_else(|_| {
            Date::parse(value, format_description!("[year]-[month]-[day]"))
                .map(|v| v.midnight().assume_utc())
                .map_err(Error::new)
        })
        .with_context(|| format!("Cannot parse `{}` as a date-time", truncate_long!(value)))
}

/// Whether the text carries a time of day, `2024-05-01` does not.
pub fn is_date_only(value: &str) -> bool {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).is_ok()
}

pub fn format_date(value: &Date) -> String {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

pub fn format_timestamp(value: &OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}

/// Human readable date-time shown by the `Display` column format, always in UTC.
pub fn format_timestamp_display(value: &OffsetDateTime) -> String {
    value
        .to_offset(offset!(UTC))
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]"
        ))
        .unwrap_or_default()
}
