use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Parses the `HH:MM` restart time. Seconds are accepted and ignored.
pub fn parse_restart_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Whether a scheduled restart should fire at `now`.
///
/// Fires when the wall clock is on the configured minute and no scheduled
/// restart has happened yet today, so repeated ticks within that minute
/// fire once.
pub fn restart_due(
    enabled: bool,
    restart_time: &str,
    last_restart: Option<NaiveDate>,
    now: NaiveDateTime,
) -> bool {
    if !enabled {
        return false;
    }
    let Some(target) = parse_restart_time(restart_time) else {
        return false;
    };
    now.hour() == target.hour()
        && now.minute() == target.minute()
        && last_restart != Some(now.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn fires_on_target_minute() {
        assert!(restart_due(true, "04:00", None, at("2024-05-01", "04:00:00")));
        assert!(restart_due(true, "04:00", None, at("2024-05-01", "04:00:59")));
        assert!(!restart_due(true, "04:00", None, at("2024-05-01", "04:01:00")));
        assert!(!restart_due(true, "04:00", None, at("2024-05-01", "16:00:00")));
    }

    #[test]
    fn fires_once_per_day() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(!restart_due(true, "04:00", Some(today), at("2024-05-01", "04:00:30")));
        assert!(restart_due(true, "04:00", Some(today), at("2024-05-02", "04:00:00")));
    }

    #[test]
    fn disabled_or_malformed_never_fires() {
        let now = at("2024-05-01", "04:00:00");
        assert!(!restart_due(false, "04:00", None, now));
        assert!(!restart_due(true, "4 o'clock", None, now));
        assert!(!restart_due(true, "", None, now));
    }

    #[test]
    fn accepts_seconds_and_whitespace() {
        assert_eq!(
            parse_restart_time(" 23:15:00 "),
            NaiveTime::from_hms_opt(23, 15, 0)
        );
        assert_eq!(parse_restart_time("7:05"), NaiveTime::from_hms_opt(7, 5, 0));
        assert_eq!(parse_restart_time("25:00"), None);
    }
}
