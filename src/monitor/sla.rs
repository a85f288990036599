use crate::data::Reservation;

/// A reservation fails its SLA once strictly more than its frequency has
/// elapsed since the last check-in. A snoozed reservation has a last
/// check-in in the future and never fails.
pub fn fails_sla(reservation: &Reservation, now: i64) -> bool {
    now.saturating_sub(reservation.last_checkin) > reservation.frequency_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reservation::test_reservation;
    use crate::data::TimeUnit;

    #[test]
    fn test_deadline_is_exclusive() {
        let now = 1_700_000_000;
        let mut res = test_reservation("billing", "nightly");

        res.last_checkin = now - 301;
        assert!(fails_sla(&res, now));
        res.last_checkin = now - 300;
        assert!(!fails_sla(&res, now));
        res.last_checkin = now;
        assert!(!fails_sla(&res, now));
    }

    #[test]
    fn test_snoozed_reservation_passes() {
        let now = 1_700_000_000;
        let mut res = test_reservation("billing", "nightly");
        res.last_checkin = now + 3600;
        assert!(!fails_sla(&res, now));
    }

    #[test]
    fn test_unknown_unit_is_days() {
        let now = 1_700_000_000;
        let mut res = test_reservation("billing", "nightly");
        res.time_units = TimeUnit::parse("weeks");
        res.last_checkin = now - 4 * 86_400;
        assert!(!fails_sla(&res, now));
        res.last_checkin = now - 5 * 86_400 - 1;
        assert!(fails_sla(&res, now));
    }
}
