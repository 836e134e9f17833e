mod common;

use coalarm_core::config::InternetConfig;
use coalarm_core::connectivity::{
    ConnectivityError, ConnectivityManager, ConnectivityState, LinkEvent, LinkEvents, MAX_RETRY,
};
use common::{Attempt, ScriptedLink, credentials};
use embassy_futures::block_on;
use embassy_time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn connects_on_first_attempt() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Lease]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(block_on(manager.connect(&mut link)), Ok(()));
    assert_eq!(manager.state(), ConnectivityState::Connected);
    assert_eq!(manager.retries(), 0);

    let log = link.log.borrow();
    assert_eq!(log.starts, 1);
    assert_eq!(log.connects, 1);
    assert_eq!(log.ssid, "workshop");
}

#[test]
fn retry_counter_is_zero_after_connecting_late() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(
        &events,
        &[Attempt::Drop, Attempt::Drop, Attempt::Drop, Attempt::Lease],
    );
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(block_on(manager.connect(&mut link)), Ok(()));
    assert_eq!(manager.state(), ConnectivityState::Connected);
    assert_eq!(manager.retries(), 0);
    assert_eq!(link.log.borrow().connects, 4);
}

#[test]
fn gives_up_after_max_retry_reconnects() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(
        block_on(manager.connect(&mut link)),
        Err(ConnectivityError::RetriesExhausted { retries: MAX_RETRY })
    );
    assert_eq!(manager.state(), ConnectivityState::Failed);

    // First attempt plus MAX_RETRY reconnects, never more
    assert_eq!(link.log.borrow().connects, 1 + MAX_RETRY as u32);
}

#[test]
fn rejected_requests_count_against_the_budget() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Reject, Attempt::Reject, Attempt::Lease]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(block_on(manager.connect(&mut link)), Ok(()));
    assert_eq!(link.log.borrow().connects, 3);
    assert_eq!(manager.retries(), 0);
}

#[test]
fn missing_credentials_fail_without_touching_the_radio() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Lease]);
    let mut manager =
        ConnectivityManager::new(InternetConfig::default(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(
        block_on(manager.connect(&mut link)),
        Err(ConnectivityError::MissingCredentials)
    );
    assert_eq!(manager.state(), ConnectivityState::Failed);
    assert_eq!(link.log.borrow().starts, 0);
}

#[test]
fn silent_radio_is_bounded_by_the_timeout() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Silent]);
    let mut manager =
        ConnectivityManager::new(credentials(), MAX_RETRY, Duration::from_millis(50), &events);

    assert_eq!(
        block_on(manager.connect(&mut link)),
        Err(ConnectivityError::Timeout { secs: 0 })
    );
    assert_eq!(manager.state(), ConnectivityState::Failed);
}

#[test]
fn stale_events_are_discarded_before_waiting() {
    let events = LinkEvents::new();
    events.try_send(LinkEvent::AddressAcquired).unwrap();

    let mut link = ScriptedLink::new(&events, &[Attempt::Drop, Attempt::Lease]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);

    assert_eq!(block_on(manager.connect(&mut link)), Ok(()));
    assert_eq!(link.log.borrow().connects, 2);
}

#[test]
fn drop_while_sampling_reconnects_and_recovers() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Lease, Attempt::Lease]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);
    block_on(manager.connect(&mut link)).unwrap();

    manager.handle_event(&mut link, LinkEvent::Disconnected);
    assert_eq!(manager.state(), ConnectivityState::Connecting);
    assert_eq!(manager.retries(), 1);
    assert_eq!(link.log.borrow().connects, 2);

    let lease = events.try_receive().unwrap();
    manager.handle_event(&mut link, lease);
    assert_eq!(manager.state(), ConnectivityState::Connected);
    assert_eq!(manager.retries(), 0);
}

#[test]
fn shutdown_releases_the_radio() {
    let events = LinkEvents::new();
    let mut link = ScriptedLink::new(&events, &[Attempt::Lease]);
    let mut manager = ConnectivityManager::new(credentials(), MAX_RETRY, TIMEOUT, &events);
    block_on(manager.connect(&mut link)).unwrap();

    block_on(manager.shutdown(&mut link));
    assert_eq!(manager.state(), ConnectivityState::Disconnected);
    assert_eq!(link.log.borrow().shutdowns, 1);
}
