use super::*;
use chrono::{FixedOffset, Utc};

fn wednesday_nine() -> WeeklySlot {
    WeeklySlot {
        day: Weekday::Wednesday,
        time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    }
}

#[test]
fn test_weekday_round_trip() {
    use chrono::Weekday as ChronoWd;

    let days = vec![
        ChronoWd::Mon,
        ChronoWd::Tue,
        ChronoWd::Wed,
        ChronoWd::Thu,
        ChronoWd::Fri,
        ChronoWd::Sat,
        ChronoWd::Sun,
    ];

    for day in days {
        let our_day = Weekday::from_chrono(day);
        let back_to_chrono = our_day.to_chrono();
        assert_eq!(day, back_to_chrono);
    }
}

#[test]
fn test_weekly_slot_later_same_week() {
    // Monday 2024-01-01
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let next = wednesday_nine().next_after(&now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap());
}

#[test]
fn test_weekly_slot_same_day_before_time() {
    // Wednesday 2024-01-03 08:59:59
    let now = Utc.with_ymd_and_hms(2024, 1, 3, 8, 59, 59).unwrap();
    let next = wednesday_nine().next_after(&now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap());
}

#[test]
fn test_weekly_slot_exactly_at_time_moves_to_next_week() {
    let now = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
    let next = wednesday_nine().next_after(&now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap());
}

#[test]
fn test_weekly_slot_respects_offset_time_zone() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    // Wednesday 10:00 local is already past the slot
    let now = tz.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
    let next = wednesday_nine().next_after(&now).unwrap();
    assert_eq!(next, tz.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap());
    assert_eq!(next.hour(), 9);
}

#[test]
fn test_hourly_cadence_rejects_non_divisors() {
    assert!(HourlyCadence::new(0).is_none());
    assert!(HourlyCadence::new(5).is_none());
    assert!(HourlyCadence::new(7).is_none());
    assert_eq!(HourlyCadence::new(6).unwrap().every_hours(), 6);
    assert!(HourlyCadence::new(24).is_some());
}

#[test]
fn test_hourly_cadence_aligns_to_midnight() {
    let cadence = HourlyCadence::new(6).unwrap();

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(
        cadence.next_after(&now).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
    );

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 59, 59).unwrap();
    assert_eq!(
        cadence.next_after(&now).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
    );

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 19, 30, 0).unwrap();
    assert_eq!(
        cadence.next_after(&now).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_hourly_cadence_every_hour() {
    let cadence = HourlyCadence::new(1).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 23, 15, 0).unwrap();
    assert_eq!(
        cadence.next_after(&now).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_weekly_slot_serialization() {
    let slot = WeeklySlot {
        day: Weekday::Friday,
        time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
    };

    let json = serde_json::to_string(&slot).unwrap();
    assert_eq!(json, r#"{"day":"Friday","time":"18:30:00"}"#);

    let deserialized: WeeklySlot = serde_json::from_str(&json).unwrap();
    assert_eq!(slot, deserialized);
}

#[test]
fn test_time_format_accepts_hours_and_minutes() {
    let slot: WeeklySlot = serde_json::from_str(r#"{"day":"Monday","time":"07:45"}"#).unwrap();
    assert_eq!(slot.time, NaiveTime::from_hms_opt(7, 45, 0).unwrap());
}

#[test]
fn test_weekly_policy_default_and_names() {
    assert_eq!(WeeklyPolicy::default(), WeeklyPolicy::Always);
    assert_eq!(
        serde_json::to_string(&WeeklyPolicy::WhenNewer).unwrap(),
        r#""when_newer""#
    );
}
