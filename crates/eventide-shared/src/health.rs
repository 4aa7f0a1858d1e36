//! Health check utilities

use crate::observability::{HealthCheck, HealthStatus};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Simple health check that always returns healthy
pub struct AlwaysHealthy {
    name: String,
}

impl AlwaysHealthy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HealthCheck for AlwaysHealthy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// Health check based on last activity timestamp
pub struct ActivityBasedHealthCheck {
    name: String,
    last_activity: Mutex<Instant>,
    timeout: Duration,
}

impl ActivityBasedHealthCheck {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            last_activity: Mutex::new(Instant::now()),
            timeout,
        }
    }

    /// Update the last activity timestamp. A plain `std::sync::Mutex` (never held across an
    /// `.await`) rather than a `tokio::sync::RwLock`, since `check()` is a synchronous trait
    /// method that must also be callable from inside async contexts without blocking-read
    /// panics.
    pub async fn record_activity(&self) {
        *self.last_activity.lock().expect("last_activity mutex poisoned") = Instant::now();
    }
}

impl HealthCheck for ActivityBasedHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthStatus {
        let last_activity = *self.last_activity.lock().expect("last_activity mutex poisoned");
        let elapsed = last_activity.elapsed();
        
        if elapsed > self.timeout {
            HealthStatus::Unhealthy {
                reason: format!("No activity for {:?}", elapsed),
            }
        } else if elapsed > self.timeout / 2 {
            HealthStatus::Degraded {
                reason: format!("Low activity, last seen {:?} ago", elapsed),
            }
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Connection-based health check
pub struct ConnectionHealthCheck {
    name: String,
    check_fn: Box<dyn Fn() -> bool + Send + Sync>,
}

impl ConnectionHealthCheck {
    pub fn new<F>(name: impl Into<String>, check_fn: F) -> Self 
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check_fn: Box::new(check_fn),
        }
    }
}

impl HealthCheck for ConnectionHealthCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthStatus {
        if (self.check_fn)() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy {
                reason: "Connection check failed".to_string(),
            }
        }
    }
}
