//! Injectable time source.
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Source of "today" and "now" for the stateful tracker.
///
/// Pure scoring and generation functions never consult a clock; they take
/// the date as an argument.
pub trait Clock {
    /// Calendar date considered "today".
    fn today(&self) -> NaiveDate;

    /// Timestamp used for entries and awards.
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: NaiveDateTime,
}

impl FixedClock {
    #[must_use]
    pub const fn new(instant: NaiveDateTime) -> Self {
        Self { instant }
    }

    /// Pin the clock to noon on `date`.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
        Self::new(date.and_time(noon))
    }

    /// Move the pinned instant to noon on another date.
    pub fn set_date(&mut self, date: NaiveDate) {
        *self = Self::on(date);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.instant.date()
    }

    fn now(&self) -> NaiveDateTime {
        self.instant
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_pinned_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut clock = FixedClock::on(date);
        assert_eq!(clock.today(), date);
        assert_eq!(clock.now().date(), date);

        let next = date.succ_opt().unwrap();
        clock.set_date(next);
        assert_eq!(clock.today(), next);
    }
}
