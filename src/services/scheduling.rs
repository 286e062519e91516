use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::models::BusinessHours;

/// Offsets wilder than ±14h are storage garbage; clamp into range.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

fn tenant_offset(offset_minutes: i32) -> FixedOffset {
    let clamped = offset_minutes.clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
    FixedOffset::east_opt(clamped * 60).unwrap_or_else(|| Utc.fix())
}

/// Interprets a wall-clock time in the tenant's fixed offset and returns
/// the UTC instant. The inverse of `utc_to_local`.
pub fn local_to_utc(local: &NaiveDateTime, offset_minutes: i32) -> DateTime<Utc> {
    match local.and_local_timezone(tenant_offset(offset_minutes)) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // Fixed offsets have no DST gaps; only reachable with corrupt data.
        _ => Utc.from_utc_datetime(local),
    }
}

pub fn utc_to_local(utc: &DateTime<Utc>, offset_minutes: i32) -> NaiveDateTime {
    utc.with_timezone(&tenant_offset(offset_minutes)).naive_local()
}

/// Combines the extractor's "YYYY-MM-DD" and "HH:MM" slots. None when
/// either does not parse; the caller re-asks instead of guessing.
pub fn parse_extracted_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = chrono::NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time_str = time.trim();
    let time = chrono::NaiveTime::parse_from_str(time_str, "%H:%M")
        .or_else(|_| chrono::NaiveTime::parse_from_str(time_str, "%H:%M:%S"))
        .ok()?;
    Some(date.and_time(time))
}

/// Customer-facing rendering of a UTC instant on the tenant's clock.
pub fn format_local(utc: &DateTime<Utc>, offset_minutes: i32) -> String {
    utc_to_local(utc, offset_minutes)
        .format("%d/%m/%Y às %H:%M")
        .to_string()
}

#[derive(Debug)]
pub struct OutsideHours {
    pub hours: String,
}

/// Business-hours gate over the tenant's local wall clock. No configured
/// hours (or an empty slot list) means no restriction.
pub fn check_business_hours(
    hours: Option<&BusinessHours>,
    local: &NaiveDateTime,
    duration_minutes: i64,
) -> Result<(), OutsideHours> {
    let Some(hours) = hours else {
        return Ok(());
    };
    if hours.slots.is_empty() {
        return Ok(());
    }

    if !hours.is_within(local) || !hours.fits_within(local, duration_minutes) {
        return Err(OutsideHours {
            hours: hours.to_human_readable(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    const SAO_PAULO: i32 = -180;

    #[test]
    fn test_local_to_utc_sao_paulo() {
        let utc = local_to_utc(&dt("2025-06-16 15:00"), SAO_PAULO);
        assert_eq!(utc.naive_utc(), dt("2025-06-16 18:00"));
    }

    #[test]
    fn test_utc_to_local_sao_paulo() {
        let utc = Utc.from_utc_datetime(&dt("2025-06-16 18:00"));
        assert_eq!(utc_to_local(&utc, SAO_PAULO), dt("2025-06-16 15:00"));
    }

    #[test]
    fn test_round_trip_is_identity() {
        let local = dt("2025-12-31 23:30");
        assert_eq!(utc_to_local(&local_to_utc(&local, SAO_PAULO), SAO_PAULO), local);

        let east = 120; // UTC+2
        assert_eq!(utc_to_local(&local_to_utc(&local, east), east), local);
        assert_eq!(local_to_utc(&dt("2025-06-16 15:00"), east).naive_utc(), dt("2025-06-16 13:00"));
    }

    #[test]
    fn test_absurd_offset_is_clamped() {
        let utc = local_to_utc(&dt("2025-06-16 15:00"), 99_999);
        // clamped to +14h
        assert_eq!(utc.naive_utc(), dt("2025-06-16 01:00"));
    }

    #[test]
    fn test_parse_extracted_datetime() {
        assert_eq!(
            parse_extracted_datetime("2025-06-16", "15:00"),
            Some(dt("2025-06-16 15:00"))
        );
        assert_eq!(
            parse_extracted_datetime("2025-06-16", "15:00:00"),
            Some(dt("2025-06-16 15:00"))
        );
        assert!(parse_extracted_datetime("amanhã", "15:00").is_none());
        assert!(parse_extracted_datetime("2025-06-16", "tarde").is_none());
    }

    #[test]
    fn test_format_local() {
        let utc = Utc.from_utc_datetime(&dt("2025-06-16 18:00"));
        assert_eq!(format_local(&utc, SAO_PAULO), "16/06/2025 às 15:00");
    }

    #[test]
    fn test_hours_gate_outside() {
        let hours = BusinessHours::from_json(
            r#"{"slots":[{"day":"mon","start":"08:00","end":"17:00"}]}"#,
        )
        .unwrap();
        // 2025-06-16 is a Monday
        let err = check_business_hours(Some(&hours), &dt("2025-06-16 22:00"), 60).unwrap_err();
        assert!(err.hours.contains("08:00"));
        assert!(err.hours.contains("17:00"));
    }

    #[test]
    fn test_hours_gate_duration_overflow() {
        let hours = BusinessHours::from_json(
            r#"{"slots":[{"day":"mon","start":"08:00","end":"17:00"}]}"#,
        )
        .unwrap();
        assert!(check_business_hours(Some(&hours), &dt("2025-06-16 16:30"), 60).is_err());
        assert!(check_business_hours(Some(&hours), &dt("2025-06-16 16:00"), 60).is_ok());
    }

    #[test]
    fn test_hours_gate_unconfigured_is_open() {
        assert!(check_business_hours(None, &dt("2025-06-15 23:00"), 60).is_ok());
        let empty = BusinessHours { slots: vec![] };
        assert!(check_business_hours(Some(&empty), &dt("2025-06-15 23:00"), 60).is_ok());
    }
}
