//! Human-readable relative timestamps ("5 minutes ago", "2 days from now")

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;
const LONG_TIME: i64 = 37 * YEAR;

enum Phrase {
    Now,
    Fixed(&'static str),
    Count { unit: &'static str, div: i64 },
    LongWhile,
}

/// (exclusive upper bound in seconds, phrase)
const MAGNITUDES: &[(i64, Phrase)] = &[
    (1, Phrase::Now),
    (2, Phrase::Fixed("1 second")),
    (MINUTE, Phrase::Count { unit: "seconds", div: 1 }),
    (2 * MINUTE, Phrase::Fixed("1 minute")),
    (HOUR, Phrase::Count { unit: "minutes", div: MINUTE }),
    (2 * HOUR, Phrase::Fixed("1 hour")),
    (DAY, Phrase::Count { unit: "hours", div: HOUR }),
    (2 * DAY, Phrase::Fixed("1 day")),
    (WEEK, Phrase::Count { unit: "days", div: DAY }),
    (2 * WEEK, Phrase::Fixed("1 week")),
    (MONTH, Phrase::Count { unit: "weeks", div: WEEK }),
    (2 * MONTH, Phrase::Fixed("1 month")),
    (YEAR, Phrase::Count { unit: "months", div: MONTH }),
    (18 * MONTH, Phrase::Fixed("1 year")),
    (2 * YEAR, Phrase::Fixed("2 years")),
    (LONG_TIME, Phrase::Count { unit: "years", div: YEAR }),
    (i64::MAX, Phrase::LongWhile),
];

/// Describe `then` relative to `now`, both unix seconds
pub fn relative_time(then: i64, now: i64) -> String {
    let (diff, suffix) = if then > now {
        (then - now, "from now")
    } else {
        (now - then, "ago")
    };

    let phrase = MAGNITUDES
        .iter()
        .find(|(bound, _)| diff < *bound)
        .map(|(_, phrase)| phrase)
        .unwrap_or(&Phrase::LongWhile);

    match phrase {
        Phrase::Now => "now".to_string(),
        Phrase::Fixed(text) => format!("{} {}", text, suffix),
        Phrase::Count { unit, div } => format!("{} {} {}", diff / div, unit, suffix),
        Phrase::LongWhile => format!("a long while {}", suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time_past() {
        let now = 1_000_000;
        assert_eq!(relative_time(now, now), "now");
        assert_eq!(relative_time(now - 1, now), "1 second ago");
        assert_eq!(relative_time(now - 45, now), "45 seconds ago");
        assert_eq!(relative_time(now - 300, now), "5 minutes ago");
        assert_eq!(relative_time(now - 90 * MINUTE, now), "1 hour ago");
        assert_eq!(relative_time(now - 3 * DAY, now), "3 days ago");
    }

    #[test]
    fn test_relative_time_future() {
        let now = 1_000_000;
        assert_eq!(relative_time(now + DAY, now), "1 day from now");
        assert_eq!(relative_time(now + 5 * HOUR, now), "5 hours from now");
    }

    #[test]
    fn test_relative_time_long_while() {
        assert_eq!(relative_time(0, 40 * YEAR), "a long while ago");
    }
}
