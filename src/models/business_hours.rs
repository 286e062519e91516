use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursSlot {
    pub day: String,
    pub start: String,
    pub end: String,
}

/// Weekly opening hours, stored per tenant as a JSON blob. Slot days are
/// lowercase three-letter English keys; display is localized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub slots: Vec<HoursSlot>,
}

const DAY_ORDER: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const DAY_LABELS: [&str; 7] = ["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];

impl BusinessHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: BusinessHours = serde_json::from_str(s)?;
        for slot in &hours.slots {
            parse_weekday(&slot.day)?;
            parse_time(&slot.start)?;
            parse_time(&slot.end)?;
        }
        Ok(hours)
    }

    /// True when `local` falls inside any slot for its weekday. Times are
    /// compared lexically, which is exact for zero-padded "HH:MM".
    pub fn is_within(&self, local: &chrono::NaiveDateTime) -> bool {
        let weekday = local.format("%a").to_string().to_lowercase();
        let time = local.format("%H:%M").to_string();

        self.slots.iter().any(|slot| {
            slot.day.to_lowercase() == weekday && time >= slot.start && time < slot.end
        })
    }

    /// True when the whole appointment, start through start+duration, fits
    /// inside a single slot of that weekday.
    pub fn fits_within(&self, local: &chrono::NaiveDateTime, duration_minutes: i64) -> bool {
        let end = *local + chrono::Duration::minutes(duration_minutes);
        // Crossing midnight never fits a same-day slot, and the wrapped
        // "00:xx" end would compare below the slot end.
        if end.date() != local.date() {
            return false;
        }
        let weekday = local.format("%a").to_string().to_lowercase();
        let start_time = local.format("%H:%M").to_string();
        let end_time = end.format("%H:%M").to_string();

        self.slots.iter().any(|slot| {
            slot.day.to_lowercase() == weekday
                && start_time >= slot.start
                && end_time <= slot.end
        })
    }

    /// "Seg: 08:00-17:00, Ter: 08:00-17:00" for customer-facing replies.
    pub fn to_human_readable(&self) -> String {
        if self.slots.is_empty() {
            return String::new();
        }

        let mut sorted = self.slots.clone();
        sorted.sort_by_key(|s| day_index(&s.day));

        sorted
            .iter()
            .map(|s| format!("{}: {}-{}", day_label(&s.day), s.start, s.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn day_index(day: &str) -> usize {
    let day = day.to_lowercase();
    DAY_ORDER.iter().position(|d| *d == day).unwrap_or(7)
}

fn day_label(day: &str) -> &'static str {
    match day_index(day) {
        i if i < 7 => DAY_LABELS[i],
        _ => "?",
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    if DAY_ORDER.contains(&s.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid weekday: {s}"))
    }
}

fn parse_time(s: &str) -> anyhow::Result<()> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn weekdays_9_17() -> BusinessHours {
        let json = r#"{"slots":[
            {"day":"mon","start":"09:00","end":"17:00"},
            {"day":"tue","start":"09:00","end":"17:00"}
        ]}"#;
        BusinessHours::from_json(json).unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let hours = weekdays_9_17();
        assert_eq!(hours.slots.len(), 2);
        assert_eq!(hours.slots[0].day, "mon");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(BusinessHours::from_json("not json").is_err());
    }

    #[test]
    fn test_parse_invalid_day() {
        let json = r#"{"slots":[{"day":"xyz","start":"09:00","end":"17:00"}]}"#;
        assert!(BusinessHours::from_json(json).is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"slots":[{"day":"mon","start":"25:00","end":"17:00"}]}"#;
        assert!(BusinessHours::from_json(json).is_err());
    }

    #[test]
    fn test_is_within_hours() {
        let hours = weekdays_9_17();
        // 2025-06-16 is a Monday
        assert!(hours.is_within(&dt("2025-06-16 10:00")));
        assert!(hours.is_within(&dt("2025-06-16 09:00")));
        assert!(hours.is_within(&dt("2025-06-16 16:59")));
    }

    #[test]
    fn test_is_within_outside_hours() {
        let hours = weekdays_9_17();
        assert!(!hours.is_within(&dt("2025-06-16 08:00")));
        assert!(!hours.is_within(&dt("2025-06-16 17:00")));
        assert!(!hours.is_within(&dt("2025-06-16 22:00")));
    }

    #[test]
    fn test_is_within_wrong_day() {
        let hours = weekdays_9_17();
        // 2025-06-18 is a Wednesday, no slot
        assert!(!hours.is_within(&dt("2025-06-18 10:00")));
    }

    #[test]
    fn test_fits_within_duration() {
        let hours = weekdays_9_17();
        assert!(hours.fits_within(&dt("2025-06-16 09:00"), 60));
        assert!(hours.fits_within(&dt("2025-06-16 16:00"), 60));
        assert!(!hours.fits_within(&dt("2025-06-16 16:30"), 60));
    }

    #[test]
    fn test_fits_within_rejects_midnight_wrap() {
        let json = r#"{"slots":[{"day":"mon","start":"09:00","end":"23:59"}]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert!(hours.fits_within(&dt("2025-06-16 22:00"), 60));
        // Ends 00:30 the next day; the wrapped time must not pass the slot check.
        assert!(!hours.fits_within(&dt("2025-06-16 23:30"), 60));
    }

    #[test]
    fn test_to_human_readable_sorted_and_localized() {
        let json = r#"{"slots":[
            {"day":"fri","start":"10:00","end":"16:00"},
            {"day":"mon","start":"09:00","end":"17:00"}
        ]}"#;
        let hours = BusinessHours::from_json(json).unwrap();
        assert_eq!(hours.to_human_readable(), "Seg: 09:00-17:00, Sex: 10:00-16:00");
    }

    #[test]
    fn test_to_human_readable_empty() {
        let hours = BusinessHours { slots: vec![] };
        assert_eq!(hours.to_human_readable(), "");
    }
}
