use std::sync::Mutex;
use std::time::Instant;

/// Monotonic time source in seconds. Only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// Wall clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly by the host, for offline stepping and deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        Self {
            secs: Mutex::new(start_secs),
        }
    }

    pub fn set(&self, secs: f64) {
        *self.lock() = secs;
    }

    pub fn advance(&self, delta_secs: f64) {
        *self.lock() += delta_secs;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, f64> {
        // A poisoned f64 is still a valid reading.
        self.secs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        *self.lock()
    }
}
