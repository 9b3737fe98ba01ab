//! Shared state handed to every resource implementation

use ibmform_client::{CdnClient, CisClient, ContainerClient, Session, TaggingClient, VpcClient};
use ibmform_provider::StateChangeConf;
use std::time::Duration;

/// Polling behaviour for state-change waits
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    pub delay: Duration,
    pub min_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            min_timeout: Duration::from_secs(10),
            poll_interval: Duration::ZERO,
        }
    }
}

impl Polling {
    /// Poll at a fixed interval without an initial delay
    pub fn every(interval: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: interval,
        }
    }
}

/// Session plus polling configuration
#[derive(Clone)]
pub struct Context {
    session: Session,
    polling: Polling,
}

impl Context {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn vpc(&self) -> VpcClient {
        self.session.vpc()
    }

    pub fn cis(&self) -> CisClient {
        self.session.cis()
    }

    pub fn cdn(&self) -> CdnClient {
        self.session.cdn()
    }

    pub fn container(&self) -> ContainerClient {
        self.session.container()
    }

    pub fn tagging(&self) -> TaggingClient {
        self.session.tagging()
    }

    /// Resource group id from provider configuration
    pub fn default_resource_group(&self) -> Option<String> {
        self.session.config().resource_group.clone()
    }

    /// Waiter configured with this context's polling
    pub fn state_change(&self, pending: &[&str], target: &[&str], timeout: Duration) -> StateChangeConf {
        let conf = StateChangeConf::new(pending, target, timeout)
            .with_delay(self.polling.delay)
            .with_min_timeout(self.polling.min_timeout);
        if self.polling.poll_interval.is_zero() {
            conf
        } else {
            conf.with_poll_interval(self.polling.poll_interval)
        }
    }
}
