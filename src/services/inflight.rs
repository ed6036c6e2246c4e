use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use futures::future::{BoxFuture, Shared};

use crate::error::SummaryError;
use crate::models::SummaryView;

/// A generation that several callers can await together.
pub type Flight = Shared<BoxFuture<'static, Result<SummaryView, SummaryError>>>;

/// Generations currently running, keyed by video id.
#[derive(Default)]
pub struct FlightRegistry {
    flights: Mutex<HashMap<String, Flight>>,
}

impl FlightRegistry {
    /// Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, HashMap<String, Flight>> {
        self.flights.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn finish(&self, video_id: &str) {
        self.lock().remove(video_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
