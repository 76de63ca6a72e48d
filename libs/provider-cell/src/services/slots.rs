// libs/provider-cell/src/services/slots.rs
//! Bookable time grid.
//!
//! Every day from today to the end of the horizon gets fixed 30 minute slots
//! from the horizon's start hour up to 18:00. A slot is booked when any of the
//! selected providers already holds that time on that date. The grid is fully
//! materialized and rebuilt whenever the selection changes.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use shared_models::provider::Provider;

use crate::models::{DaySlots, TimeSlot};

pub const SLOT_MINUTES: i64 = 30;
pub const DAY_END_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotHorizon {
    /// Calendar months covered, counting the current one.
    pub months: u32,
    pub start_hour: u32,
}

impl SlotHorizon {
    /// Browsing a single provider: a year ahead, whole days.
    pub const SINGLE_PROVIDER: SlotHorizon = SlotHorizon { months: 12, start_hour: 0 };

    /// Grouped booking: three months ahead, clinic hours.
    pub const MULTI_PROVIDER: SlotHorizon = SlotHorizon { months: 3, start_hour: 9 };

    pub fn for_selection(provider_count: usize) -> Self {
        if provider_count > 1 {
            Self::MULTI_PROVIDER
        } else {
            Self::SINGLE_PROVIDER
        }
    }

    pub fn new(months: u32, start_hour: u32) -> Self {
        Self {
            months: months.clamp(1, 24),
            start_hour: start_hour.min(DAY_END_HOUR - 1),
        }
    }

    /// Last calendar day covered when starting from `today`.
    pub fn last_day(&self, today: NaiveDate) -> NaiveDate {
        let first_month_after = today.year() * 12 + today.month0() as i32 + self.months.max(1) as i32;
        NaiveDate::from_ymd_opt(
            first_month_after.div_euclid(12),
            first_month_after.rem_euclid(12) as u32 + 1,
            1,
        )
        .and_then(|d| d.pred_opt())
        .unwrap_or(today)
    }

    fn day_times(&self) -> Vec<NaiveTime> {
        let mut times = Vec::new();
        let Some(mut time) = NaiveTime::from_hms_opt(self.start_hour.min(DAY_END_HOUR - 1), 0, 0) else {
            return times;
        };
        while time.hour() < DAY_END_HOUR {
            times.push(time);
            let (next, wrapped) = time.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
            if wrapped != 0 {
                break;
            }
            time = next;
        }
        times
    }
}

pub fn format_slot_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

pub fn parse_slot_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").ok()
}

pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

pub fn parse_slot_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%I:%M %p").ok()
}

/// Whether the time falls on a 30 minute boundary before closing.
pub fn is_on_grid(time: NaiveTime) -> bool {
    time.minute() % SLOT_MINUTES as u32 == 0 && time.second() == 0 && time.hour() < DAY_END_HOUR
}

pub fn generate_slots(providers: &[Provider], horizon: SlotHorizon, today: NaiveDate) -> Vec<DaySlots> {
    let last_day = horizon.last_day(today);
    let times = horizon.day_times();

    today
        .iter_days()
        .take_while(|date| *date <= last_day)
        .map(|date| {
            let slot_date = format_slot_date(date);
            let slots = if providers.is_empty() {
                Vec::new()
            } else {
                times
                    .iter()
                    .map(|time| {
                        let label = format_slot_time(*time);
                        let is_booked = providers
                            .iter()
                            .any(|p| p.booked_slots.is_booked(&slot_date, &label));
                        TimeSlot {
                            time: label,
                            datetime: date.and_time(*time),
                            is_booked,
                        }
                    })
                    .collect()
            };
            DaySlots { date, slot_date, slots }
        })
        .collect()
}

pub fn find_day<'a>(days: &'a [DaySlots], slot_date: &str) -> Option<&'a DaySlots> {
    days.iter().find(|d| d.slot_date == slot_date)
}

/// False for times that are booked or not on the grid at all.
pub fn is_free(days: &[DaySlots], slot_date: &str, slot_time: &str) -> bool {
    find_day(days, slot_date)
        .and_then(|day| day.slot(slot_time))
        .map_or(false, |slot| !slot.is_booked)
}

pub fn first_open_day(days: &[DaySlots]) -> Option<&DaySlots> {
    days.iter().find(|d| d.free_slots().next().is_some())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use shared_models::provider::BookedSlots;

    use super::*;

    fn provider(booked: &[(&str, &str)]) -> Provider {
        let mut booked_slots = BookedSlots::new();
        for (date, time) in booked {
            booked_slots.insert(date, time);
        }
        Provider {
            id: Uuid::new_v4(),
            name: "Dr. A".to_string(),
            speciality: "MRI".to_string(),
            about: String::new(),
            fee: 100.0,
            available: true,
            image: String::new(),
            address: None,
            booked_slots,
            created_at: Utc::now(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_match_stored_keys() {
        assert_eq!(format_slot_date(day(2025, 3, 12)), "12/3/2025");
        assert_eq!(format_slot_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()), "09:30 AM");
        assert_eq!(format_slot_time(NaiveTime::from_hms_opt(13, 0, 0).unwrap()), "01:00 PM");
        assert_eq!(parse_slot_date("12/3/2025"), Some(day(2025, 3, 12)));
        assert_eq!(parse_slot_time("10:00 AM"), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(parse_slot_time("9:30 PM"), NaiveTime::from_hms_opt(21, 30, 0));
    }

    #[test]
    fn horizon_runs_to_end_of_last_month() {
        let today = day(2025, 3, 12);
        assert_eq!(SlotHorizon::MULTI_PROVIDER.last_day(today), day(2025, 5, 31));
        assert_eq!(SlotHorizon::SINGLE_PROVIDER.last_day(today), day(2026, 2, 28));
        assert_eq!(SlotHorizon::new(1, 9).last_day(day(2025, 12, 31)), day(2025, 12, 31));
    }

    #[test]
    fn day_has_half_hour_slots_until_closing() {
        let days = generate_slots(&[provider(&[])], SlotHorizon::MULTI_PROVIDER, day(2025, 3, 12));
        let first = &days[0];
        assert_eq!(first.slot_date, "12/3/2025");
        assert_eq!(first.slots.len(), 18);
        assert_eq!(first.slots[0].time, "09:00 AM");
        assert_eq!(first.slots.last().unwrap().time, "05:30 PM");

        let full_day = generate_slots(&[provider(&[])], SlotHorizon::SINGLE_PROVIDER, day(2025, 3, 12));
        assert_eq!(full_day[0].slots.len(), 36);
        assert_eq!(full_day[0].slots[0].time, "12:00 AM");
    }

    #[test]
    fn exactly_the_reserved_times_are_booked() {
        let a = provider(&[("12/3/2025", "10:00 AM"), ("12/3/2025", "11:30 AM")]);
        let b = provider(&[("12/3/2025", "02:00 PM"), ("13/3/2025", "10:00 AM")]);
        let days = generate_slots(&[a, b], SlotHorizon::MULTI_PROVIDER, day(2025, 3, 12));

        let booked: Vec<&str> = days[0]
            .slots
            .iter()
            .filter(|s| s.is_booked)
            .map(|s| s.time.as_str())
            .collect();
        assert_eq!(booked, vec!["10:00 AM", "11:30 AM", "02:00 PM"]);

        assert!(!is_free(&days, "13/3/2025", "10:00 AM"));
        assert!(is_free(&days, "13/3/2025", "10:30 AM"));
    }

    #[test]
    fn fully_booked_day_only_blocks_its_times() {
        let today = day(2025, 3, 12);
        let times: Vec<String> = SlotHorizon::MULTI_PROVIDER
            .day_times()
            .into_iter()
            .map(format_slot_time)
            .collect();
        let reserved: Vec<(&str, &str)> = times.iter().map(|t| ("12/3/2025", t.as_str())).collect();
        let days = generate_slots(&[provider(&reserved)], SlotHorizon::MULTI_PROVIDER, today);

        assert_eq!(days[0].slots.len(), 18);
        assert!(days[0].free_slots().next().is_none());
        assert_eq!(first_open_day(&days).map(|d| d.slot_date.as_str()), Some("13/3/2025"));
    }

    #[test]
    fn no_providers_means_empty_days() {
        let days = generate_slots(&[], SlotHorizon::MULTI_PROVIDER, day(2025, 3, 12));
        assert_eq!(days.len(), 81);
        assert!(days.iter().all(|d| d.slots.is_empty()));
    }

    #[test]
    fn off_grid_times_are_detected() {
        assert!(is_on_grid(NaiveTime::from_hms_opt(17, 30, 0).unwrap()));
        assert!(!is_on_grid(NaiveTime::from_hms_opt(10, 15, 0).unwrap()));
        assert!(!is_on_grid(NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
    }
}
