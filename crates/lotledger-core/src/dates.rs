//! Date/time utilities: day-granularity arithmetic on `chrono` types.

use chrono::NaiveDateTime;

/// Number of whole calendar days between two timestamps (`later - earlier`).
pub fn days_between(earlier: NaiveDateTime, later: NaiveDateTime) -> i64 {
    (later.date() - earlier.date()).num_days()
}

/// True if a closing trade held for `(dtclose - dtopen)` qualifies as long-term
/// (more than 365 days).
pub fn is_long_term(dtopen: NaiveDateTime, dtclose: NaiveDateTime) -> bool {
    days_between(dtopen, dtclose) > 365
}

/// True if `dtopen` falls within 30 calendar days of `dtclose`, either side,
/// the wash-sale replacement window.
pub fn within_wash_sale_window(dtclose: NaiveDateTime, dtopen: NaiveDateTime) -> bool {
    days_between(dtclose, dtopen).abs() <= 30
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
    }

    #[test]
    fn long_term_boundary() {
        let open = dt(2020, 1, 1);
        assert!(!is_long_term(open, dt(2020, 12, 31)));
        assert!(is_long_term(open, dt(2021, 1, 2)));
    }

    #[test]
    fn wash_sale_window_both_directions() {
        let close = dt(2005, 12, 1);
        assert!(within_wash_sale_window(close, dt(2005, 11, 3)));
        assert!(within_wash_sale_window(close, dt(2005, 12, 31)));
        assert!(!within_wash_sale_window(close, dt(2005, 10, 1)));
    }
}
