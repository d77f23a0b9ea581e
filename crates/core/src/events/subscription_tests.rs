// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    exact_match = { "stage:activated", "stage:activated", true },
    exact_mismatch = { "stage:activated", "stage:completed", false },
    category_wildcard = { "stage:*", "stage:completed", true },
    category_wildcard_other = { "stage:*", "turn:completed", false },
    match_all = { "*", "control:changed", true },
    empty_matches_nothing = { "", "stage:activated", false },
)]
fn pattern_matching(pattern: &str, event_name: &str, expected: bool) {
    assert_eq!(EventPattern::new(pattern).matches(event_name), expected);
}

#[test]
fn subscription_matches_any_of_its_patterns() {
    let subscription = Subscription::new(
        "ui",
        vec![
            EventPattern::new("stage:activated"),
            EventPattern::new("turn:*"),
        ],
        "active stage and turn watcher",
    );
    assert!(subscription.matches("stage:activated"));
    assert!(subscription.matches("turn:completed"));
    assert!(!subscription.matches("stage:completed"));
}

#[test]
fn pattern_round_trips_as_str() {
    assert_eq!(EventPattern::new("stage:*").as_str(), "stage:*");
}
