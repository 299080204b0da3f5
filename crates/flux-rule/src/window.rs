//! TIME_BASED 条件的时间窗口
//!
//! 格式：`[DAYS] [HH:MM-HH:MM] [OFFSET]`，以空白分隔，DAYS 与时间段至少出现一个。
//!
//! - DAYS：单日 `MON`、范围 `MON-FRI`（可跨周，如 `FRI-MON`）、列表 `SAT,SUN`
//! - 时间段：起点包含、终点不包含；`22:00-06:00` 跨午夜；起止相同表示全天
//! - OFFSET：`UTC`、`Z`、`+HH:MM` 或 `-HH:MM`，缺省为 UTC
//!
//! 示例：`MON-FRI 08:00-18:00 +08:00`、`SAT,SUN`、`22:00-06:00`

use crate::error::{Result, RuleError};
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use std::fmt;
use std::str::FromStr;

/// 星期范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySpec {
    /// 闭区间，允许跨周
    Range(Weekday, Weekday),
    List(Vec<Weekday>),
}

impl DaySpec {
    pub fn contains(&self, day: Weekday) -> bool {
        match self {
            DaySpec::Range(from, to) => {
                let (from, to, d) = (
                    from.num_days_from_monday(),
                    to.num_days_from_monday(),
                    day.num_days_from_monday(),
                );
                if from <= to {
                    from <= d && d <= to
                } else {
                    d >= from || d <= to
                }
            }
            DaySpec::List(days) => days.contains(&day),
        }
    }
}

/// 一天内的时间段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= t && t < self.end
        } else if self.start > self.end {
            t >= self.start || t < self.end
        } else {
            true
        }
    }
}

/// 时间窗口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub days: Option<DaySpec>,
    pub time: Option<TimeRange>,
    pub offset: FixedOffset,
}

impl TimeWindow {
    /// 判断时间点是否落在窗口内（先换算到窗口的时区）
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let day_ok = self
            .days
            .as_ref()
            .map_or(true, |days| days.contains(local.weekday()));
        let time_ok = self.time.map_or(true, |range| range.contains(local.time()));
        day_ok && time_ok
    }

    pub fn parse(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for TimeWindow {
    type Err = RuleError;

    fn from_str(value: &str) -> Result<Self> {
        let mut days = None;
        let mut time = None;
        let mut offset = None;

        for token in value.split_whitespace() {
            if is_offset_token(token) {
                if offset.is_some() {
                    return Err(RuleError::time_window(value, "offset given twice"));
                }
                offset = Some(parse_offset(value, token)?);
            } else if token.starts_with(|c: char| c.is_ascii_digit()) {
                if time.is_some() {
                    return Err(RuleError::time_window(value, "time range given twice"));
                }
                time = Some(parse_time_range(value, token)?);
            } else {
                if days.is_some() {
                    return Err(RuleError::time_window(value, "days given twice"));
                }
                days = Some(parse_days(value, token)?);
            }
        }

        if days.is_none() && time.is_none() {
            return Err(RuleError::time_window(
                value,
                "expected days or a time range",
            ));
        }

        Ok(TimeWindow {
            days,
            time,
            offset: offset.unwrap_or_else(utc_offset),
        })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        match &self.days {
            Some(DaySpec::Range(from, to)) => {
                parts.push(format!("{}-{}", day_name(*from), day_name(*to)))
            }
            Some(DaySpec::List(days)) => parts.push(
                days.iter()
                    .map(|d| day_name(*d))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            None => {}
        }

        if let Some(range) = &self.time {
            parts.push(format!(
                "{}-{}",
                range.start.format("%H:%M"),
                range.end.format("%H:%M")
            ));
        }

        let seconds = self.offset.local_minus_utc();
        if seconds != 0 {
            let sign = if seconds < 0 { '-' } else { '+' };
            let minutes = seconds.abs() / 60;
            parts.push(format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60));
        }

        f.write_str(&parts.join(" "))
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn is_offset_token(token: &str) -> bool {
    token.eq_ignore_ascii_case("utc")
        || token.eq_ignore_ascii_case("z")
        || token.starts_with('+')
        || token.starts_with('-')
}

fn parse_offset(value: &str, token: &str) -> Result<FixedOffset> {
    if token.eq_ignore_ascii_case("utc") || token.eq_ignore_ascii_case("z") {
        return Ok(utc_offset());
    }

    let sign = if token.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = token[1..]
        .split_once(':')
        .ok_or_else(|| RuleError::time_window(value, format!("invalid offset {token}")))?;
    let hours: i32 = hours
        .parse()
        .map_err(|_| RuleError::time_window(value, format!("invalid offset {token}")))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| RuleError::time_window(value, format!("invalid offset {token}")))?;
    if hours > 23 || minutes > 59 {
        return Err(RuleError::time_window(value, format!("offset out of range {token}")));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| RuleError::time_window(value, format!("offset out of range {token}")))
}

fn parse_time_range(value: &str, token: &str) -> Result<TimeRange> {
    let (start, end) = token
        .split_once('-')
        .ok_or_else(|| RuleError::time_window(value, format!("invalid time range {token}")))?;
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s, "%H:%M")
            .map_err(|e| RuleError::time_window(value, format!("invalid time {s}: {e}")))
    };
    Ok(TimeRange {
        start: parse(start)?,
        end: parse(end)?,
    })
}

fn parse_days(value: &str, token: &str) -> Result<DaySpec> {
    let parse = |s: &str| {
        parse_day(s).ok_or_else(|| RuleError::time_window(value, format!("unknown day {s}")))
    };

    if let Some((from, to)) = token.split_once('-') {
        return Ok(DaySpec::Range(parse(from)?, parse(to)?));
    }

    let days = token
        .split(',')
        .map(parse)
        .collect::<Result<Vec<_>>>()?;
    Ok(DaySpec::List(days))
}

fn parse_day(s: &str) -> Option<Weekday> {
    match s.to_ascii_uppercase().as_str() {
        "MON" => Some(Weekday::Mon),
        "TUE" => Some(Weekday::Tue),
        "WED" => Some(Weekday::Wed),
        "THU" => Some(Weekday::Thu),
        "FRI" => Some(Weekday::Fri),
        "SAT" => Some(Weekday::Sat),
        "SUN" => Some(Weekday::Sun),
        _ => None,
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}
