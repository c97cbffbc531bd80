// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn fake_clock_advance_moves_both_scales() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_utc = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start, Duration::from_secs(90));
    assert_eq!((clock.now_utc() - start_utc).num_seconds(), 90);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.now_utc().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.now(), clock.now());
}
