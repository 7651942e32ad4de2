use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Enumerates which calendar dates are trading days (spec.md GLOSSARY).
///
/// A real deployment plugs in an exchange-specific holiday calendar; this
/// crate only owns the *contract* other components consult, not the
/// concrete holiday data (out of scope per spec.md §1).
pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// The next trading day strictly after `date`.
    fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date.succ_opt().expect("date overflow");
        while !self.is_trading_day(d) {
            d = d.succ_opt().expect("date overflow");
        }
        d
    }

    /// Enumerate the next `n` trading days after `date`, in order.
    fn next_n_trading_days(&self, date: NaiveDate, n: usize) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = date;
        for _ in 0..n {
            cursor = self.next_trading_day(cursor);
            out.push(cursor);
        }
        out
    }

    /// Number of trading days strictly between `from` (exclusive) and
    /// `to` (inclusive). Used to translate a calendar-day horizon into a
    /// trading-day one (spec.md §4.9 F3 horizon computation).
    fn trading_days_between(&self, from: NaiveDate, to: NaiveDate) -> usize {
        if to <= from {
            return 0;
        }
        let mut count = 0usize;
        let mut cursor = from;
        while cursor < to {
            cursor = cursor.checked_add_days(Days::new(1)).expect("date overflow");
            if self.is_trading_day(cursor) {
                count += 1;
            }
        }
        count
    }
}

/// Weekday-only calendar (Mon–Fri). Does not model exchange holidays;
/// a production deployment supplies a real calendar through the same
/// `TradingCalendar` trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleTradingCalendar;

impl TradingCalendar for SimpleTradingCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_weekends() {
        let cal = SimpleTradingCalendar;
        // 2024-01-05 is a Friday.
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let next = cal.next_trading_day(friday);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn next_n_trading_days_skips_weekend_gap() {
        let cal = SimpleTradingCalendar;
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let days = cal.next_n_trading_days(friday, 3);
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            ]
        );
    }

    #[test]
    fn trading_days_between_counts_only_weekdays() {
        let cal = SimpleTradingCalendar;
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let next_monday_plus_week = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        // Mon 1/8 .. Mon 1/15 inclusive of 1/15, excluding weekends: 8 nine days span,
        // weekdays: 8,9,10,11,12,15 = 6
        assert_eq!(cal.trading_days_between(friday, next_monday_plus_week), 6);
    }
}
