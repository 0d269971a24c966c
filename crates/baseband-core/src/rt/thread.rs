//! # Runtime Thread Spawning
//!
//! The baseband and RSSI loops each get their own OS thread, named after the
//! loop and raised to a real-time priority from inside the new thread. On
//! Linux with the `rt-linux` feature priorities map to SCHED_FIFO and an
//! optional CPU set pins the thread; on other hosts the settings are
//! accepted and ignored.
//!
//! Raising priority needs CAP_SYS_NICE. Without it the loop still runs at
//! normal priority and a warning is logged.
//!
//! ## Example
//!
//! ```rust,no_run
//! use baseband_core::rt::{spawn_rt_thread, RtConfig, RtPriority};
//!
//! let config = RtConfig::new("baseband").with_priority(RtPriority::High);
//! let handle = spawn_rt_thread(config, || 42).unwrap();
//! assert_eq!(handle.join().unwrap(), 42);
//! ```

use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures while bringing up a runtime thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtError {
    #[error("failed to spawn thread: {0}")]
    Spawn(String),

    #[error("failed to set priority: {0}")]
    Priority(String),

    #[error("failed to set CPU affinity: {0}")]
    Affinity(String),
}

/// Scheduling class of a runtime thread.
///
/// The baseband loop runs `High`, the RSSI loop `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtPriority {
    /// Ordinary time-shared scheduling
    #[default]
    Normal,
    Low,
    Medium,
    High,
    /// Explicit SCHED_FIFO level, clamped to 1..=99
    Custom(i32),
}

impl RtPriority {
    /// SCHED_FIFO level, `None` for `Normal`.
    pub fn fifo_level(self) -> Option<i32> {
        match self {
            RtPriority::Normal => None,
            RtPriority::Low => Some(20),
            RtPriority::Medium => Some(50),
            RtPriority::High => Some(80),
            RtPriority::Custom(level) => Some(level.clamp(1, 99)),
        }
    }

    pub fn is_realtime(self) -> bool {
        self.fifo_level().is_some()
    }
}

/// How to spawn one runtime thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtConfig {
    pub name: String,
    pub priority: RtPriority,
    /// CPUs the thread may run on (empty = any)
    pub cpus: Vec<usize>,
    /// Stack size in bytes (0 = platform default)
    pub stack_size: usize,
}

impl RtConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: RtPriority::Normal,
            cpus: Vec::new(),
            stack_size: 0,
        }
    }

    pub fn with_priority(mut self, priority: RtPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cpus(mut self, cpus: &[usize]) -> Self {
        self.cpus = cpus.to_vec();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }
}

/// Spawn `f` on a new named thread with the scheduling from `config`.
///
/// Only the spawn itself can fail; priority and affinity problems are
/// logged from the new thread and it carries on.
pub fn spawn_rt_thread<F, T>(config: RtConfig, f: F) -> Result<JoinHandle<T>, RtError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut builder = thread::Builder::new().name(config.name.clone());
    if config.stack_size > 0 {
        builder = builder.stack_size(config.stack_size);
    }

    builder
        .spawn(move || {
            apply_scheduling(&config);
            f()
        })
        .map_err(|e| RtError::Spawn(e.to_string()))
}

fn apply_scheduling(config: &RtConfig) {
    if let Some(level) = config.priority.fifo_level() {
        match sys::set_fifo(level) {
            Ok(()) => debug!(thread = %config.name, level, "SCHED_FIFO set"),
            Err(e) => warn!(thread = %config.name, "{}", e),
        }
    }
    if !config.cpus.is_empty() {
        if let Err(e) = sys::pin(&config.cpus) {
            warn!(thread = %config.name, "{}", e);
        }
    }
}

#[cfg(all(target_os = "linux", feature = "rt-linux"))]
mod sys {
    use super::RtError;

    pub fn set_fifo(level: i32) -> Result<(), RtError> {
        // SAFETY: sched_param is plain data; pid 0 is the calling thread.
        let rc = unsafe {
            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = level;
            libc::sched_setscheduler(0, libc::SCHED_FIFO, &param)
        };
        if rc != 0 {
            return Err(RtError::Priority(std::io::Error::last_os_error().to_string()));
        }
        Ok(())
    }

    pub fn pin(cpus: &[usize]) -> Result<(), RtError> {
        // SAFETY: cpu_set_t is plain data filled through the libc helpers.
        let rc = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            for &cpu in cpus.iter().filter(|&&c| c < libc::CPU_SETSIZE as usize) {
                libc::CPU_SET(cpu, &mut set);
            }
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            return Err(RtError::Affinity(std::io::Error::last_os_error().to_string()));
        }
        Ok(())
    }
}

#[cfg(not(all(target_os = "linux", feature = "rt-linux")))]
mod sys {
    use super::RtError;

    pub fn set_fifo(_level: i32) -> Result<(), RtError> {
        tracing::debug!("SCHED_FIFO unavailable on this build, running time-shared");
        Ok(())
    }

    pub fn pin(_cpus: &[usize]) -> Result<(), RtError> {
        tracing::debug!("CPU pinning unavailable on this build");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_levels_order_the_loops() {
        assert_eq!(RtPriority::Normal.fifo_level(), None);
        assert_eq!(RtPriority::Medium.fifo_level(), Some(50));
        assert_eq!(RtPriority::High.fifo_level(), Some(80));
        assert_eq!(RtPriority::Custom(150).fifo_level(), Some(99));
        assert_eq!(RtPriority::Custom(-10).fifo_level(), Some(1));
        assert!(RtPriority::High.fifo_level() > RtPriority::Medium.fifo_level());
        assert!(!RtPriority::Normal.is_realtime());
        assert!(RtPriority::Medium.is_realtime());
    }

    #[test]
    fn test_config_setters() {
        let config = RtConfig::new("rssi")
            .with_priority(RtPriority::Medium)
            .with_cpus(&[1])
            .with_stack_size(256 * 1024);

        assert_eq!(config.name, "rssi");
        assert_eq!(config.priority, RtPriority::Medium);
        assert_eq!(config.cpus, vec![1]);
        assert_eq!(config.stack_size, 256 * 1024);
    }

    #[test]
    fn test_spawn_names_the_thread() {
        let handle = spawn_rt_thread(RtConfig::new("worker"), || {
            thread::current().name().map(str::to_string)
        })
        .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("worker"));
    }

    #[test]
    fn test_priority_serde() {
        let json = serde_json::to_string(&RtPriority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: RtPriority = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RtPriority::High);
    }
}
