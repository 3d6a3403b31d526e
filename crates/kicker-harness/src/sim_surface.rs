//! Recording notification surface.

use kicker_ledger::NotificationSurface;

/// Notification surface that records every update for assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSurface {
    /// Titles written, in order.
    pub titles: Vec<String>,
    /// Platform badge counts set, in order.
    pub badges: Vec<u64>,
    /// Counts posted to the background worker, in order.
    pub worker_messages: Vec<u64>,
    /// Between `init` and `teardown`.
    pub live: bool,
}

impl NotificationSurface for RecordingSurface {
    fn init(&mut self) {
        self.live = true;
    }

    fn update(&mut self, count: u64, title: &str) {
        self.titles.push(title.to_string());
        self.badges.push(count);
    }

    fn notify_worker(&mut self, count: u64) {
        self.worker_messages.push(count);
    }

    fn teardown(&mut self) {
        self.live = false;
    }
}
