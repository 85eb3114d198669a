//! Property-based tests for the interval overlap predicate and slot generation.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use skedify::services::scheduling::{
    filter_available, generate_candidates, overlaps, Interval, SlotPolicy,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 6, 17)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// A non-empty interval starting somewhere within one day, at most 8 hours long.
fn arb_interval() -> impl Strategy<Value = Interval> {
    (0i64..24 * 60, 1i64..=480).prop_map(|(offset, minutes)| {
        Interval::from_duration(base() + Duration::minutes(offset), minutes).unwrap()
    })
}

fn arb_policy() -> impl Strategy<Value = SlotPolicy> {
    (0u32..12, 1u32..12, prop_oneof![Just(5i64), Just(10), Just(15), Just(30), Just(60)]).prop_map(
        |(start_hour, hours, step)| SlotPolicy {
            window_start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap(),
            window_end: NaiveTime::from_hms_opt(start_hour + hours, 0, 0).unwrap(),
            step_minutes: step,
        },
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn overlap_is_symmetric(a in arb_interval(), b in arb_interval()) {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
    }

    #[test]
    fn interval_overlaps_itself(a in arb_interval()) {
        prop_assert!(overlaps(&a, &a));
    }

    #[test]
    fn touching_intervals_never_overlap(a in arb_interval(), minutes in 1i64..=480) {
        let next = Interval::from_duration(a.end, minutes).unwrap();
        prop_assert!(!overlaps(&a, &next));
        prop_assert!(!overlaps(&next, &a));
    }

    #[test]
    fn candidates_start_inside_window(policy in arb_policy(), minutes in 1i64..=480) {
        let date = base().date();
        let candidates = generate_candidates(date, minutes, &policy);

        let window_start = date.and_time(policy.window_start);
        let window_end = date.and_time(policy.window_end);
        let window_minutes = (window_end - window_start).num_minutes();
        let expected = (window_minutes + policy.step_minutes - 1) / policy.step_minutes;
        prop_assert_eq!(candidates.len() as i64, expected);

        for pair in candidates.windows(2) {
            prop_assert_eq!(pair[1].start - pair[0].start, Duration::minutes(policy.step_minutes));
        }
        for candidate in &candidates {
            prop_assert!(candidate.start >= window_start && candidate.start < window_end);
            prop_assert_eq!(candidate.end - candidate.start, Duration::minutes(minutes));
        }
    }

    #[test]
    fn available_slots_avoid_busy_time(
        busy in prop::collection::vec(arb_interval(), 0..6),
        minutes in 1i64..=120,
    ) {
        let policy = SlotPolicy::default();
        let candidates = generate_candidates(base().date(), minutes, &policy);
        let free = filter_available(&candidates, &busy);

        prop_assert!(free.len() <= candidates.len());
        for start in free {
            let slot = Interval::from_duration(start, minutes).unwrap();
            prop_assert!(busy.iter().all(|b| !overlaps(&slot, b)));
        }
    }
}
