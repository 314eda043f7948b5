use chrono::{
    naive::{NaiveDate, NaiveDateTime, NaiveTime},
    DateTime, FixedOffset, TimeZone, Utc,
};

use crate::mapper::MapperOptions;

/// The column types Snowflake reports in a JSON row type
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Fixed,
    Real,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    Variant,
    Object,
    Array,
    #[serde(other)]
    Unknown,
}

/// The kind of value a target field expects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    Json,
}

/// A coerced value
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i128),
    Float(f64),
    Varchar(String),
    Binary(Vec<u8>),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Wall clock timestamps (TIMESTAMP_NTZ)
    Timestamp(NaiveDateTime),
    /// Timestamps with an offset (TIMESTAMP_LTZ as UTC, TIMESTAMP_TZ as sent)
    TimestampTz(DateTime<FixedOffset>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<Cell> for serde_json::Value {
    fn from(cell: Cell) -> Self {
        use serde_json::json;
        use Cell::*;
        match cell {
            Null => json!(null),
            // Keep integers wider than i64 exact
            Int(value) => match i64::try_from(value) {
                Ok(value) => json!(value),
                Err(_) => json!(value.to_string()),
            },
            Float(value) => json!(value),
            Varchar(value) => json!(value),
            Binary(value) => json!(hex::encode(value)),
            Boolean(value) => json!(value),
            Date(value) => json!(value),
            Time(value) => json!(value),
            Timestamp(value) => json!(value),
            TimestampTz(value) => json!(value),
            Json(value) => value,
        }
    }
}

const TRUE_TOKENS: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];
const FALSE_TOKENS: [&str; 6] = ["0", "false", "f", "no", "n", "off"];

fn parse_bool(value: &str) -> Result<bool, String> {
    let token = value.trim().to_ascii_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Ok(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Ok(false)
    } else {
        Err(format!("`{value}` is not a boolean"))
    }
}

fn parse_float(value: &str) -> Result<f64, String> {
    // Snowflake spells the special values this way, Rust mostly agrees
    match value.trim() {
        "NaN" => Ok(f64::NAN),
        "inf" | "Infinity" => Ok(f64::INFINITY),
        "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
        other => other
            .parse()
            .map_err(|_| format!("`{value}` is not a number")),
    }
}

fn parse_integer(value: &str, lossy: bool) -> Result<i128, String> {
    let value = value.trim();
    if let Ok(int) = value.parse() {
        return Ok(int);
    }
    match value.split_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b == b'0') => whole
            .parse()
            .map_err(|_| format!("`{value}` is not an integer")),
        Some((whole, _)) if lossy => {
            // Truncate towards zero, same as a cast
            if whole.is_empty() || whole == "-" {
                Ok(0)
            } else {
                whole
                    .parse()
                    .map_err(|_| format!("`{value}` is not an integer"))
            }
        }
        Some(_) => Err(format!("`{value}` has a fractional part")),
        None => Err(format!("`{value}` is not an integer")),
    }
}

/// Split `seconds[.fraction]` into whole seconds and nanoseconds,
/// honoring the column scale and flooring negative values
fn parse_epoch(value: &str, scale: u32) -> Result<(i64, u32), String> {
    let value = value.trim();
    let invalid = || format!("`{value}` is not an epoch value");
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let negative = whole.starts_with('-');
    let mut seconds: i64 = whole.parse().map_err(|_| invalid())?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // The scale says how many fraction digits are significant
    let digits = match scale {
        0 => fraction.len(),
        scale => fraction.len().min(scale as usize),
    }
    .min(9);
    let mut nanos: u32 = if digits == 0 {
        0
    } else {
        let significant: u32 = fraction[..digits].parse().map_err(|_| invalid())?;
        significant * 10u32.pow(9 - digits as u32)
    };
    if negative && nanos > 0 {
        seconds = seconds.checked_sub(1).ok_or_else(invalid)?;
        nanos = 1_000_000_000 - nanos;
    }
    Ok((seconds, nanos))
}

// Day number of 1970-01-01 counted from 0001-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let days: i64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a day count"))?;
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(|days| i32::try_from(days).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| format!("`{value}` days is out of range"))
}

fn parse_time(value: &str, scale: u32) -> Result<NaiveTime, String> {
    let (seconds, nanos) = parse_epoch(value, scale)?;
    u32::try_from(seconds)
        .ok()
        .and_then(|seconds| NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos))
        .ok_or_else(|| format!("`{value}` is not a time of day"))
}

fn parse_utc(value: &str, scale: u32) -> Result<DateTime<Utc>, String> {
    let (seconds, nanos) = parse_epoch(value, scale)?;
    Utc.timestamp_opt(seconds, nanos)
        .single()
        .ok_or_else(|| format!("`{value}` is out of range"))
}

/// TIMESTAMP_TZ arrives as `<epoch seconds> <offset in minutes + 1440>`
fn parse_timestamp_tz(value: &str, scale: u32) -> Result<DateTime<FixedOffset>, String> {
    let (epoch, offset) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("`{value}` has no time zone"))?;
    let offset = offset
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_sub(1440))
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| format!("`{value}` has an invalid time zone"))?;
    Ok(parse_utc(epoch, scale)?.with_timezone(&offset))
}

fn parse_text_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("`{value}` is not a timestamp"))
}

fn parse_json(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("invalid JSON: {e}"))
}

fn mismatch(sql_type: SqlType, kind: ValueKind) -> String {
    format!("a {sql_type:?} column cannot be read as {kind:?}")
}

impl SqlType {
    /// Coerce one non-null cell of this column type into the expected kind
    ///
    /// `scale` is the column scale, used for fractional seconds.
    /// Any column can be read as `Text`, which returns the string untouched.
    pub fn coerce(
        &self,
        value: &str,
        scale: u32,
        kind: ValueKind,
        options: &MapperOptions,
    ) -> Result<Cell, String> {
        use SqlType::*;
        use ValueKind as K;
        if kind == K::Text {
            return Ok(Cell::Varchar(value.to_owned()));
        }
        match (self, kind) {
            (Fixed | Real | Text | Unknown, K::Integer) => {
                parse_integer(value, options.lossy_numbers).map(Cell::Int)
            }
            (Fixed | Real | Text | Unknown, K::Float) => parse_float(value).map(Cell::Float),
            (Boolean | Fixed | Text | Unknown, K::Boolean) => parse_bool(value).map(Cell::Boolean),
            (Binary, K::Binary) => hex::decode(value.trim())
                .map(Cell::Binary)
                .map_err(|e| format!("invalid hex: {e}")),
            (Text | Unknown, K::Binary) => Ok(Cell::Binary(value.as_bytes().to_vec())),
            (Date, K::Date) => parse_date(value).map(Cell::Date),
            (Date, K::Timestamp) => parse_date(value)?
                .and_hms_opt(0, 0, 0)
                .map(Cell::Timestamp)
                .ok_or_else(|| format!("`{value}` is out of range")),
            (Time, K::Time) => parse_time(value, scale).map(Cell::Time),
            (TimestampNtz, K::Timestamp) => {
                parse_utc(value, scale).map(|utc| Cell::Timestamp(utc.naive_utc()))
            }
            (TimestampLtz, K::Timestamp) => {
                parse_utc(value, scale).map(|utc| Cell::TimestampTz(utc.into()))
            }
            (TimestampTz, K::Timestamp) => parse_timestamp_tz(value, scale).map(Cell::TimestampTz),
            (TimestampNtz, K::Date) => parse_utc(value, scale).map(|utc| Cell::Date(utc.date_naive())),
            (Text | Unknown, K::Timestamp) => parse_text_timestamp(value).map(Cell::Timestamp),
            (Text | Unknown, K::Date) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(Cell::Date)
                .map_err(|_| format!("`{value}` is not a date")),
            (Text | Unknown, K::Time) => NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f")
                .map(Cell::Time)
                .map_err(|_| format!("`{value}` is not a time")),
            (Variant | Object | Array | Text | Unknown, K::Json) => parse_json(value).map(Cell::Json),
            // Scalars read as JSON become the matching JSON scalar
            (Fixed | Real, K::Json) => parse_json(value.trim()).map(Cell::Json),
            (Boolean, K::Json) => parse_bool(value).map(|b| Cell::Json(b.into())),
            (sql_type, kind) => Err(mismatch(*sql_type, kind)),
        }
    }
}
