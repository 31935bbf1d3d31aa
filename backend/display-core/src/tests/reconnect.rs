use crate::supervisor::ReconnectPolicy;

use std::time::Duration;

use backoff::backoff::Backoff;

/// **VALUE**: The default policy waits the same five seconds every time.
///
/// **BUG THIS CATCHES**: Would catch the default drifting to an exponential
/// policy, which makes a kiosk slow to come back after a long outage.
#[test]
fn given_default_policy_when_backing_off_then_delay_is_constant() {
    // GIVEN
    let policy = ReconnectPolicy::default();
    let mut backoff = policy.backoff();

    // WHEN
    let delays: Vec<_> = (0..4).filter_map(|_| backoff.next_backoff()).collect();

    // THEN
    assert_eq!(delays, vec![Duration::from_secs(5); 4]);
    assert_eq!(policy.ceiling(), Duration::from_secs(5));
}

/// **VALUE**: Exponential delays grow but never exceed the configured cap.
///
/// **BUG THIS CATCHES**: Would catch the cap being ignored, or `max_elapsed_time`
/// ending the backoff so the supervisor stops retrying.
#[test]
fn given_exponential_policy_when_backing_off_then_grows_up_to_max() {
    // GIVEN
    let policy = ReconnectPolicy::Exponential {
        initial: Duration::from_millis(100),
        max: Duration::from_millis(400),
    };
    let mut backoff = policy.backoff();

    // WHEN
    let delays: Vec<_> = (0..20).map(|_| backoff.next_backoff()).collect();

    // THEN
    assert!(delays.iter().all(Option::is_some));
    let first = delays[0].expect("checked");
    assert!(first <= Duration::from_millis(150));
    // Jitter is applied on top of the capped interval.
    assert!(delays.iter().flatten().all(|d| *d <= Duration::from_millis(600)));
    assert_eq!(policy.ceiling(), Duration::from_millis(400));
}

#[test]
fn given_grown_backoff_when_reset_then_starts_over() {
    // GIVEN
    let policy = ReconnectPolicy::Exponential {
        initial: Duration::from_millis(100),
        max: Duration::from_secs(10),
    };
    let mut backoff = policy.backoff();
    for _ in 0..10 {
        backoff.next_backoff();
    }

    // WHEN
    backoff.reset();
    let next = backoff.next_backoff().expect("never exhausts");

    // THEN
    assert!(next <= Duration::from_millis(150));
}
