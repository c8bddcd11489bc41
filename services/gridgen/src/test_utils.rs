//! In-memory `FrameSink` for tests
//!
//! Records every transmission attempt and decides delivery by a fixed policy, so
//! profile behavior can be checked without sockets or wall-clock waits.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gridgen_protocols::modbus::DEFAULT_MODBUS_PORT;
use gridgen_protocols::{Delivery, Frame, FrameSink, Target};
use parking_lot::Mutex;

/// Which attempts succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    Always,
    Never,
    /// Every n-th attempt (1-based) fails, the rest succeed
    FailEveryNth(usize),
}

/// One recorded transmission attempt
#[derive(Debug, Clone)]
pub struct Attempt {
    pub frame: Frame,
    pub port: Option<u16>,
    pub delivered: bool,
}

#[derive(Debug)]
pub struct RecordingSink {
    target: Target,
    policy: DeliveryPolicy,
    attempts: AtomicUsize,
    log: Mutex<Vec<Attempt>>,
}

impl RecordingSink {
    #[allow(clippy::disallowed_methods)] // Test helper - constant target is always valid
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            target: Target::new("127.0.0.1", DEFAULT_MODBUS_PORT).expect("loopback target"),
            policy,
            attempts: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.log.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_count(&self) -> usize {
        self.log.lock().iter().filter(|a| a.delivered).count()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn transmit(&self, frame: &Frame, port: Option<u16>) -> Delivery {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delivered = match self.policy {
            DeliveryPolicy::Always => true,
            DeliveryPolicy::Never => false,
            DeliveryPolicy::FailEveryNth(n) => n == 0 || attempt % n != 0,
        };

        self.log.lock().push(Attempt {
            frame: frame.clone(),
            port,
            delivered,
        });

        if delivered {
            Delivery::Sent
        } else {
            Delivery::Failed
        }
    }

    fn target(&self) -> &Target {
        &self.target
    }
}
