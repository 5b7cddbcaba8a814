//! Execution boundary for engine calls.
//!
//! Every capability invocation runs here: on the blocking pool, under a
//! wall-clock deadline, behind a global and a per-engine concurrency
//! ceiling, with a bounded result size and a private diagnostics sink.
//! Whatever happens inside (error, panic, runaway loop, oversized output)
//! comes back as a [`DispatchError`] and the process keeps serving.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sidecar_sdk::diagnostics::{Diagnostics, Level};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};

/// Idle per-engine slot tables are pruned once this many engines are tracked.
const ENGINE_TABLE_PRUNE_AT: usize = 1024;

/// Ceilings applied to each contained call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Wall-clock budget, including time spent waiting for a slot.
    pub timeout: Duration,
    /// Largest accepted result, measured as serialized JSON.
    pub max_result_bytes: usize,
    /// Diagnostics text kept per call.
    pub max_diagnostic_bytes: usize,
    /// Calls allowed to run at once.
    pub max_concurrent: usize,
    /// Calls one engine may hold at once, capped at `max_concurrent`.
    pub max_per_engine: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ResourceLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.dispatch_timeout,
            max_result_bytes: config.max_result_bytes,
            max_diagnostic_bytes: config.max_diagnostic_bytes,
            max_concurrent: config.max_concurrent_dispatches,
            max_per_engine: config.max_concurrent_per_engine,
        }
    }
}

/// Runs engine work in isolation from the request path.
///
/// A timed-out call keeps its slots until its thread returns. The
/// per-engine ceiling stops one stuck engine from holding every global
/// slot.
#[derive(Debug, Clone)]
pub struct ExecutionBoundary {
    limits: ResourceLimits,
    permits: Arc<Semaphore>,
    engine_permits: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl ExecutionBoundary {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
            engine_permits: Arc::new(Mutex::new(HashMap::new())),
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ResourceLimits::from_config(config))
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Slots available to a single engine.
    pub fn per_engine_limit(&self) -> usize {
        self.limits
            .max_per_engine
            .clamp(1, self.limits.max_concurrent.max(1))
    }

    /// Calls currently holding a slot.
    ///
    /// Includes timed-out calls whose thread has not yet returned.
    pub fn in_flight(&self) -> usize {
        self.limits
            .max_concurrent
            .max(1)
            .saturating_sub(self.permits.available_permits())
    }

    /// Run `op` inside the boundary.
    ///
    /// `op` receives the call's diagnostics sink. The sink is drained to the
    /// log when the call ends, whatever the outcome.
    pub async fn run<T, F>(&self, engine: &str, op: F) -> DispatchResult<T>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&Diagnostics) -> DispatchResult<T> + Send + 'static,
    {
        let request_id = Uuid::now_v7();
        let span = info_span!("dispatch", engine = %engine, request_id = %request_id);
        self.run_inner(engine, op).instrument(span).await
    }

    async fn run_inner<T, F>(&self, engine: &str, op: F) -> DispatchResult<T>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&Diagnostics) -> DispatchResult<T> + Send + 'static,
    {
        let started = Instant::now();
        let deadline = started + self.limits.timeout;

        let engine_permit = self
            .acquire(engine, self.engine_slots(engine), deadline, "for this engine")
            .await?;
        let permit = self
            .acquire(engine, Arc::clone(&self.permits), deadline, "available")
            .await?;

        let diagnostics = Diagnostics::new(self.limits.max_diagnostic_bytes);
        let sink = diagnostics.clone();
        let max_result_bytes = self.limits.max_result_bytes;
        let engine_name = engine.to_string();

        let handle = tokio::task::spawn_blocking(move || {
            // Held until the engine returns, even if the caller gave up.
            let _permits = (engine_permit, permit);
            let value = op(&sink)?;
            check_result_size(&engine_name, &value, max_result_bytes)?;
            Ok(value)
        });

        let outcome = match timeout_at(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => match join_err.try_into_panic() {
                Ok(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "engine panicked");
                    Err(DispatchError::fault(engine, format!("engine panicked: {message}")))
                }
                Err(join_err) => Err(DispatchError::fault(engine, join_err.to_string())),
            },
            Err(_elapsed) => {
                warn!(
                    timeout_secs = self.limits.timeout.as_secs_f64(),
                    "engine call abandoned at deadline"
                );
                Err(DispatchError::resource_exceeded(
                    engine,
                    format!(
                        "wall-clock limit of {}s reached",
                        self.limits.timeout.as_secs_f64()
                    ),
                ))
            }
        };

        flush_diagnostics(&diagnostics);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "dispatch finished"
        );
        outcome
    }

    /// Take a slot from `slots` before `deadline`.
    async fn acquire(
        &self,
        engine: &str,
        slots: Arc<Semaphore>,
        deadline: Instant,
        scope: &str,
    ) -> DispatchResult<OwnedSemaphorePermit> {
        match timeout_at(deadline, slots.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(DispatchError::fault(
                engine,
                "execution boundary is shut down",
            )),
            Err(_elapsed) => {
                warn!(
                    max_concurrent = self.limits.max_concurrent,
                    max_per_engine = self.per_engine_limit(),
                    scope,
                    "no dispatch slot freed before the deadline"
                );
                Err(DispatchError::resource_exceeded(
                    engine,
                    format!(
                        "no execution slot {scope} within {}s",
                        self.limits.timeout.as_secs_f64()
                    ),
                ))
            }
        }
    }

    /// The slot table for one engine, created on first use.
    fn engine_slots(&self, engine: &str) -> Arc<Semaphore> {
        let mut table = self.engine_permits.lock();
        if let Some(slots) = table.get(engine) {
            return Arc::clone(slots);
        }
        if table.len() >= ENGINE_TABLE_PRUNE_AT {
            // Only the table holds idle entries.
            table.retain(|_, slots| Arc::strong_count(slots) > 1);
        }
        let slots = Arc::new(Semaphore::new(self.per_engine_limit()));
        table.insert(engine.to_string(), Arc::clone(&slots));
        slots
    }
}

/// Forward captured diagnostics to the log.
fn flush_diagnostics(diagnostics: &Diagnostics) {
    let (entries, dropped) = diagnostics.drain();
    for entry in entries {
        let level = match entry.level {
            Level::Debug => "debug",
            Level::Notice => "notice",
            Level::Warning => "warning",
        };
        debug!(level, diagnostic = %entry.message, "engine diagnostic");
    }
    if dropped > 0 {
        warn!(dropped, "engine diagnostics over the cap were discarded");
    }
}

/// Counts serialized bytes and refuses to go past `limit`.
struct CountingWriter {
    written: usize,
    limit: usize,
    exceeded: bool,
}

impl io::Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len();
        if self.written > self.limit {
            self.exceeded = true;
            return Err(io::Error::other("result size limit reached"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn check_result_size<T: Serialize>(engine: &str, value: &T, limit: usize) -> DispatchResult<()> {
    let mut counter = CountingWriter {
        written: 0,
        limit,
        exceeded: false,
    };
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => Ok(()),
        Err(_) if counter.exceeded => Err(DispatchError::resource_exceeded(
            engine,
            format!("result larger than {limit} bytes"),
        )),
        Err(e) => Err(DispatchError::fault(
            engine,
            format!("result is not serializable: {e}"),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Route panic reports through tracing instead of raw stderr.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let message = panic_message(info.payload());
        error!(location = %location, panic = %message, "thread panicked");
    }));
}
