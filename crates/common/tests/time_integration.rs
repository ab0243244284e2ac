//! Integration tests for the `time` module.
//!
//! Covers the mock clock together with recurrence evaluation the way the
//! schedule expander drives them: read "now" from a clock, compute the next
//! run, advance the clock past it.

#![cfg(feature = "runtime")]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use crmsync_common::time::recurrence::parse_timezone;
use crmsync_common::{Clock, MockClock, Recurrence};

#[test]
fn cron_schedule_walks_forward_with_mock_clock() {
    let clock = MockClock::at_ymd_hms(2024, 1, 1, 0, 0, 0);
    let rule = Recurrence::parse("0 */6 * * *").expect("cron parses");
    let tz = parse_timezone("UTC").expect("utc resolves");

    let mut fired = Vec::new();
    let mut next = rule.next_after(clock.now(), tz).expect("next run");
    for _ in 0..4 {
        clock.set(next);
        fired.push(clock.now());
        next = rule.next_after(clock.now(), tz).expect("next run");
    }

    let expected: Vec<_> =
        [6, 12, 18].iter().map(|h| Utc.with_ymd_and_hms(2024, 1, 1, *h, 0, 0).unwrap()).collect();
    assert_eq!(&fired[..3], &expected[..]);
    assert_eq!(fired[3], Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
}

#[test]
fn fixed_interval_is_independent_of_timezone() {
    let clock = MockClock::at_ymd_hms(2024, 10, 27, 0, 30, 0);
    let rule = Recurrence::parse("every 2h").expect("interval parses");

    let utc_next = rule.next_after(clock.now(), parse_timezone("UTC").unwrap()).unwrap();
    let berlin_next = rule.next_after(clock.now(), parse_timezone("Europe/Berlin").unwrap()).unwrap();

    assert_eq!(utc_next, berlin_next);
    assert_eq!(utc_next - clock.now(), chrono::Duration::hours(2));
}

#[test]
fn mock_clock_advance_moves_epoch_millis() {
    let clock = MockClock::at_ymd_hms(2024, 2, 1, 0, 0, 0);
    let before = clock.epoch_millis();

    clock.advance(Duration::from_millis(60_000));

    assert_eq!(clock.epoch_millis() - before, 60_000);
}
