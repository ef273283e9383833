use std::time::Duration;

/// Timing of the live-browser host, separate from the observer's own config.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// How often the in-page queues are drained into host events.
    pub pump_interval: Duration,
    /// Budget for the initial page navigation.
    pub navigation: Duration,
    /// Grace period past the observer timeout before giving up on a ready event.
    pub settle: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pump_interval: Duration::from_millis(50),
            navigation: Duration::from_millis(30000),
            settle: Duration::from_millis(1000),
        }
    }
}

impl PumpConfig {
    pub fn with_pump_interval(mut self, ms: u64) -> Self {
        self.pump_interval = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_navigation(mut self, ms: u64) -> Self {
        self.navigation = Duration::from_millis(ms);
        self
    }

    pub fn with_settle(mut self, ms: u64) -> Self {
        self.settle = Duration::from_millis(ms);
        self
    }

    pub fn fast() -> Self {
        Self {
            pump_interval: Duration::from_millis(25),
            navigation: Duration::from_millis(20000),
            settle: Duration::from_millis(500),
        }
    }

    pub fn patient() -> Self {
        Self {
            pump_interval: Duration::from_millis(100),
            navigation: Duration::from_millis(60000),
            settle: Duration::from_millis(2000),
        }
    }
}
