//! Argument parsing helpers.

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveTime, Weekday};

use garage_core::storage::{CaseStatus, PaymentMethod, Urgency};

pub fn parse_urgency(value: &str) -> Result<Urgency> {
    match value.to_ascii_lowercase().as_str() {
        "low" => Ok(Urgency::Low),
        "normal" => Ok(Urgency::Normal),
        "high" => Ok(Urgency::High),
        other => bail!("unknown urgency '{}': expected low, normal or high", other),
    }
}

pub fn parse_status(value: &str) -> Result<CaseStatus> {
    CaseStatus::parse(&value.to_ascii_uppercase())
        .map_err(|_| anyhow!("unknown status '{}'", value))
}

pub fn parse_weekday(value: &str) -> Result<Weekday> {
    match value.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => bail!("unknown weekday '{}'", other),
    }
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| anyhow!("invalid time '{}': expected HH:MM", value))
}

pub fn parse_method(value: &str) -> Result<PaymentMethod> {
    PaymentMethod::parse(&value.to_ascii_uppercase())
        .map_err(|_| anyhow!("unknown payment method '{}'", value))
}
