//! Test doubles shared by unit tests.

use crate::executor::{AsyncSleep, Sleep};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub(crate) struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleep {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[async_trait]
impl AsyncSleep for RecordingSleep {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
