//! Wi-Fi station connection with bounded retry
//!
//! States: DISCONNECTED -> CONNECTING -> {CONNECTED, CONNECTING (retry), FAILED}.
//!
//! The radio's event context is the single producer of [`LinkEvent`]s into a
//! [`LinkEvents`] channel; the control loop is the single consumer. An event
//! is removed from the channel only when the consumer interprets it, so a
//! later wait never sees a stale result.

use core::future::Future;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::config::InternetConfig;

/// Reconnect attempts allowed after the first one before giving up.
pub const MAX_RETRY: u8 = 5;

pub const LINK_EVENT_CAPACITY: usize = 4;

/// Channel carrying link events from the radio to the control loop.
pub type LinkEvents = Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal for this wake cycle
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Association lost or an attempt failed
    Disconnected,
    /// DHCP handed out an address
    AddressAcquired,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Issue a connect attempt
    Connect,
    /// A terminal state for the current wait was reached
    Settled(ConnectivityState),
    Idle,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("station configuration rejected")]
    Config,
    #[error("radio failed to start")]
    Start,
    #[error("connect request rejected")]
    Connect,
    #[error("radio failed to stop")]
    Stop,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("no network credentials provisioned")]
    MissingCredentials,
    #[error("gave up after {retries} retries")]
    RetriesExhausted { retries: u8 },
    #[error("no result within {secs} s")]
    Timeout { secs: u64 },
    #[error("link error: {0}")]
    Link(LinkError),
}

/// Pure transition logic, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityMachine {
    state: ConnectivityState,
    retries: u8,
    max_retry: u8,
}

impl ConnectivityMachine {
    pub const fn new(max_retry: u8) -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            retries: 0,
            max_retry,
        }
    }

    pub const fn state(&self) -> ConnectivityState {
        self.state
    }

    pub const fn retries(&self) -> u8 {
        self.retries
    }

    pub const fn max_retry(&self) -> u8 {
        self.max_retry
    }

    /// DISCONNECTED -> CONNECTING with the first attempt.
    pub fn start(&mut self) -> Action {
        match self.state {
            ConnectivityState::Disconnected => {
                self.state = ConnectivityState::Connecting;
                self.retries = 0;
                Action::Connect
            }
            ConnectivityState::Connecting => Action::Idle,
            settled => Action::Settled(settled),
        }
    }

    pub fn on_event(&mut self, event: LinkEvent) -> Action {
        match (self.state, event) {
            (ConnectivityState::Connecting, LinkEvent::AddressAcquired) => {
                self.state = ConnectivityState::Connected;
                self.retries = 0;
                Action::Settled(ConnectivityState::Connected)
            }
            (ConnectivityState::Connecting | ConnectivityState::Connected, LinkEvent::Disconnected)
                if self.retries < self.max_retry =>
            {
                self.state = ConnectivityState::Connecting;
                self.retries += 1;
                Action::Connect
            }
            (ConnectivityState::Connecting | ConnectivityState::Connected, LinkEvent::Disconnected) => {
                self.state = ConnectivityState::Failed;
                Action::Settled(ConnectivityState::Failed)
            }
            _ => Action::Idle,
        }
    }

    /// Abandon the current wait. FAILED stays until the next boot.
    pub fn fail(&mut self) {
        self.state = ConnectivityState::Failed;
    }

    /// Back to DISCONNECTED after the link is released.
    pub fn reset(&mut self) {
        self.state = ConnectivityState::Disconnected;
        self.retries = 0;
    }
}

/// Station-mode radio. Connect outcomes are reported as [`LinkEvent`]s, not
/// through the return value of [`WifiLink::connect`].
pub trait WifiLink {
    /// Configure station mode with `credentials` and start the radio.
    fn start(
        &mut self,
        credentials: &InternetConfig<'_>,
    ) -> impl Future<Output = Result<(), LinkError>>;

    /// Issue one non-blocking connect attempt.
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Stop the radio and release the wireless stack.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), LinkError>>;
}

pub struct ConnectivityManager<'a> {
    machine: ConnectivityMachine,
    credentials: InternetConfig<'a>,
    timeout: Duration,
    events: &'a LinkEvents,
}

impl<'a> ConnectivityManager<'a> {
    pub const fn new(
        credentials: InternetConfig<'a>,
        max_retry: u8,
        timeout: Duration,
        events: &'a LinkEvents,
    ) -> Self {
        Self {
            machine: ConnectivityMachine::new(max_retry),
            credentials,
            timeout,
            events,
        }
    }

    pub const fn state(&self) -> ConnectivityState {
        self.machine.state()
    }

    pub const fn retries(&self) -> u8 {
        self.machine.retries()
    }

    pub const fn events(&self) -> &'a LinkEvents {
        self.events
    }

    /// Bring the link up and block until CONNECTED or FAILED.
    ///
    /// This is the only blocking wait of a wake cycle. It ends after at
    /// most `max_retry` reconnect attempts, or when the timeout expires,
    /// whichever comes first.
    pub async fn connect<L: WifiLink>(&mut self, link: &mut L) -> Result<(), ConnectivityError> {
        if !self.credentials.is_provisioned() {
            warn!("Wi-Fi credentials not provisioned, staying offline");
            self.machine.fail();
            return Err(ConnectivityError::MissingCredentials);
        }

        // Anything queued before this wait belongs to an earlier attempt
        while self.events.try_receive().is_ok() {}

        info!("Starting Wi-Fi station for SSID \"{}\"", self.credentials.ssid);
        if let Err(e) = link.start(&self.credentials).await {
            error!("Wi-Fi start failed: {}", e);
            self.machine.fail();
            return Err(ConnectivityError::Link(e));
        }

        let timeout = self.timeout;
        match with_timeout(timeout, self.wait_settled(link)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Wi-Fi connect timed out after {} s", timeout.as_secs());
                self.machine.fail();
                Err(ConnectivityError::Timeout {
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    async fn wait_settled<L: WifiLink>(&mut self, link: &mut L) -> Result<(), ConnectivityError> {
        let events = self.events;
        let mut action = self.machine.start();

        loop {
            match action {
                Action::Connect => {
                    action = self.attempt(link);
                    if action != Action::Idle {
                        continue;
                    }
                }
                Action::Settled(ConnectivityState::Connected) => {
                    info!("Wi-Fi connected");
                    return Ok(());
                }
                Action::Settled(_) => {
                    let retries = self.machine.retries();
                    error!("Wi-Fi connection failed after {} retries", retries);
                    return Err(ConnectivityError::RetriesExhausted { retries });
                }
                Action::Idle => {}
            }

            let event = events.receive().await;
            action = self.machine.on_event(event);
        }
    }

    /// Issue a connect attempt. A rejected request counts as a disconnect.
    fn attempt<L: WifiLink>(&mut self, link: &mut L) -> Action {
        info!(
            "Wi-Fi connect attempt (retry {}/{})",
            self.machine.retries(),
            self.machine.max_retry()
        );
        match link.connect() {
            Ok(()) => Action::Idle,
            Err(e) => {
                warn!("Wi-Fi connect request failed: {}", e);
                self.machine.on_event(LinkEvent::Disconnected)
            }
        }
    }

    /// Handle an event that arrives after the boot-time wait, such as the
    /// access point dropping while sampling. Reconnects within the same
    /// retry budget.
    pub fn handle_event<L: WifiLink>(&mut self, link: &mut L, event: LinkEvent) {
        let mut action = self.machine.on_event(event);
        while action == Action::Connect {
            action = self.attempt(link);
        }

        match action {
            Action::Settled(ConnectivityState::Connected) => info!("Wi-Fi reconnected"),
            Action::Settled(_) => warn!("Wi-Fi lost, retries exhausted; continuing offline"),
            _ => {}
        }
    }

    /// Stop and release the radio.
    pub async fn shutdown<L: WifiLink>(&mut self, link: &mut L) {
        if let Err(e) = link.shutdown().await {
            warn!("Wi-Fi shutdown failed: {}", e);
        }
        self.machine.reset();
        info!("Wi-Fi released");
    }
}
