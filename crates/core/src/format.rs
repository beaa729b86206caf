use chrono::{DateTime, NaiveDate, Utc};

/// `45 min`, `1h 30min`, `2h`.
#[must_use]
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}min"),
    }
}

/// Day-first date as the clinic reads it: `27/10/2025`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[must_use]
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%d/%m/%Y %H:%M").to_string()
}

#[must_use]
pub fn format_size_mb(size_mb: f64) -> String {
    if size_mb >= 1024.0 {
        format!("{:.2} GB", size_mb / 1024.0)
    } else {
        format!("{size_mb:.2} MB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45 min");
        assert_eq!(format_duration(90), "1h 30min");
        assert_eq!(format_duration(120), "2h");
        assert_eq!(format_duration(0), "0 min");
    }

    #[test]
    fn dates_are_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 7).unwrap();
        assert_eq!(format_date(date), "07/10/2025");
        assert_eq!(format_datetime(crate::time::fixed_now()), "14/11/2023 22:13");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size_mb(12.5), "12.50 MB");
        assert_eq!(format_size_mb(2048.0), "2.00 GB");
    }
}
