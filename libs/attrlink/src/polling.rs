//! Polling engine
//!
//! One engine instance drives one device: it decides what to poll each
//! cycle, hands the batched request to a protocol adapter, and folds the
//! result back into the component state cache.
//!
//! Writes enter asynchronously through [`enqueue_write`] and accumulate in a
//! [`PendingWrites`] map until the next cycle drains them. Reads are
//! scheduled per attribute from its polling period. A written attribute is
//! always also read in the same cycle (a bonus poll), so state only ever
//! reflects what the hardware confirmed.
//!
//! The polling task is the only writer of the cache and the last-polled
//! table; adapters receive the request by value and cannot reach either.
//!
//! [`enqueue_write`]: PollerCore::enqueue_write

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, trace};

use crate::error::{LinkError, Result};
use crate::state::{
    AttrReading, CommunicationStateCallback, CommunicationStatus, ComponentStateCallback,
    ComponentUpdate, PowerState, StateCache,
};
use crate::value::AttrValue;

/// Batched read/write work for one poll cycle.
///
/// Created fresh by [`PollerCore::get_request`], consumed by the adapter,
/// discarded afterwards. `reads` follows registry order and cannot contain
/// duplicates.
#[derive(Debug, Clone)]
pub struct PollRequest<W> {
    pub writes: HashMap<String, W>,
    pub reads: Vec<String>,
}

impl<W> PollRequest<W> {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.reads.is_empty()
    }
}

/// Confirmed values from one poll cycle, keyed by attribute name
pub type PollResponse = HashMap<String, AttrValue>;

/// Protocol adapter seam.
///
/// One implementation per hardware family. `Converted` is the
/// hardware-ready form of a written value; conversion happens in
/// [`from_native`](Self::from_native) so that it can run synchronously at
/// enqueue time. `poll` owns the whole wire exchange for a cycle: writes are
/// dispatched before reads, and the response contains only attributes the
/// hardware actually confirmed.
#[async_trait]
pub trait PollAdapter: Send + Sync {
    /// Hardware-ready form of a written value
    type Converted: Send + 'static;

    /// Convert a native value for the named attribute, failing fast on
    /// unknown names or malformed values.
    fn from_native(&self, name: &str, value: &AttrValue) -> Result<Self::Converted>;

    /// Execute one batched request against the hardware.
    async fn poll(&self, request: PollRequest<Self::Converted>) -> Result<PollResponse>;
}

/// Writes queued between polls.
///
/// A new write for the same attribute supersedes the undelivered one.
/// `drain` swaps the whole map out under the lock, so concurrent `upsert`
/// calls are never lost and never delivered twice.
#[derive(Debug)]
pub struct PendingWrites<W> {
    inner: Mutex<HashMap<String, W>>,
}

impl<W> PendingWrites<W> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn upsert(&self, name: String, value: W) {
        self.inner.lock().expect("lock poisoned").insert(name, value);
    }

    pub fn drain(&self) -> HashMap<String, W> {
        std::mem::take(&mut *self.inner.lock().expect("lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<W> Default for PendingWrites<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct ScheduleEntry {
    name: String,
    period: Duration,
}

/// Shared engine state: the write queue, the read schedule and the
/// component state cache, plus the adapter that executes cycles.
pub struct PollerCore<A: PollAdapter> {
    device: String,
    adapter: A,
    schedule: Vec<ScheduleEntry>,
    pending: PendingWrites<A::Converted>,
    /// `None` = never polled, so the first cycle reads everything.
    last_polled: Mutex<HashMap<String, Option<Instant>>>,
    cache: Mutex<StateCache>,
    communication: Mutex<CommunicationStatus>,
    communication_state_callback: CommunicationStateCallback,
    component_state_callback: ComponentStateCallback,
}

impl<A: PollAdapter> PollerCore<A> {
    /// Assemble the next cycle's request.
    ///
    /// Pending writes are drained atomically. Reads are every attribute
    /// whose last successful poll is at least its polling period ago, plus
    /// every attribute being written, in registry order.
    pub fn get_request(&self) -> PollRequest<A::Converted> {
        let writes = self.pending.drain();

        let now = Instant::now();
        let last_polled = self.last_polled.lock().expect("lock poisoned");
        let reads = self
            .schedule
            .iter()
            .filter(|entry| {
                let due = match last_polled.get(&entry.name).copied().flatten() {
                    None => true,
                    Some(last) => now.duration_since(last) >= entry.period,
                };
                // bonus poll after writing
                due || writes.contains_key(&entry.name)
            })
            .map(|entry| entry.name.clone())
            .collect();

        PollRequest { writes, reads }
    }

    /// Run one get_request -> poll -> fold cycle.
    pub async fn execute_cycle(&self) {
        let request = self.get_request();
        trace!(
            "[{}] polling: {} writes, {} reads",
            self.device,
            request.writes.len(),
            request.reads.len()
        );

        match self.adapter.poll(request).await {
            Ok(response) => self.poll_succeeded(response),
            Err(e) => self.poll_failed(&e),
        }
    }

    /// Fold a successful poll into the cache and notify observers.
    pub fn poll_succeeded(&self, response: PollResponse) {
        // One timestamp per poll keeps the readings internally consistent.
        let now = Instant::now();
        {
            let mut last_polled = self.last_polled.lock().expect("lock poisoned");
            for name in response.keys() {
                last_polled.insert(name.clone(), Some(now));
            }
        }

        let stamped = Utc::now();
        self.cache
            .lock()
            .expect("lock poisoned")
            .apply(&response, stamped);

        self.set_communication_status(CommunicationStatus::Established);

        debug!("[{}] poll applied {} readings", self.device, response.len());
        let update = ComponentUpdate {
            power: PowerState::On,
            changed: response,
        };
        (self.component_state_callback)(&update);
    }

    /// Degrade reported state after a failed cycle.
    ///
    /// The last-polled table is left untouched, so the same attributes are
    /// due again on the next tick. A cycle failure is treated as
    /// device-wide: every cached reading is marked invalid.
    pub fn poll_failed(&self, error: &LinkError) {
        error!("[{}] poll cycle failed: {}", self.device, error);

        self.cache.lock().expect("lock poisoned").invalidate_all();
        self.set_communication_status(CommunicationStatus::NotEstablished);

        let update = ComponentUpdate {
            power: PowerState::Unknown,
            changed: HashMap::new(),
        };
        (self.component_state_callback)(&update);
    }

    /// Queue a value to be written on the next poll.
    ///
    /// Conversion runs here so a malformed value fails at the call site
    /// rather than inside the polling task. A pending write for the same
    /// attribute is superseded.
    pub fn enqueue_write(&self, name: &str, value: AttrValue) -> Result<()> {
        let converted = self.adapter.from_native(name, &value)?;
        self.pending.upsert(name.to_string(), converted);
        trace!("[{}] queued write for {}", self.device, name);
        Ok(())
    }

    pub fn communication_status(&self) -> CommunicationStatus {
        *self.communication.lock().expect("lock poisoned")
    }

    /// Cached reading for one attribute
    pub fn reading(&self, name: &str) -> Option<AttrReading> {
        self.cache
            .lock()
            .expect("lock poisoned")
            .reading(name)
            .cloned()
    }

    /// Clone of the whole cache
    pub fn snapshot(&self) -> HashMap<String, AttrReading> {
        self.cache.lock().expect("lock poisoned").snapshot()
    }

    fn set_communication_status(&self, status: CommunicationStatus) {
        {
            let mut current = self.communication.lock().expect("lock poisoned");
            if *current == status {
                return;
            }
            info!("[{}] communication {} -> {}", self.device, *current, status);
            *current = status;
        }
        (self.communication_state_callback)(status);
    }
}

/// Attribute poller: a [`PollerCore`] plus the periodic task driving it.
pub struct AttributePoller<A: PollAdapter> {
    core: Arc<PollerCore<A>>,
    poll_rate: Duration,
    polling_task: Option<JoinHandle<()>>,
}

impl<A: PollAdapter + 'static> AttributePoller<A> {
    /// Create a poller for one device.
    ///
    /// `attributes` supplies (name, polling period) pairs in registry order,
    /// typically from `AttrRegistry::schedule()`.
    pub fn new(
        device: impl Into<String>,
        adapter: A,
        attributes: impl IntoIterator<Item = (String, Duration)>,
        poll_rate: Duration,
        communication_state_callback: CommunicationStateCallback,
        component_state_callback: ComponentStateCallback,
    ) -> Self {
        let schedule: Vec<ScheduleEntry> = attributes
            .into_iter()
            .map(|(name, period)| ScheduleEntry { name, period })
            .collect();
        let cache = StateCache::new(schedule.iter().map(|entry| entry.name.clone()));
        let last_polled = schedule
            .iter()
            .map(|entry| (entry.name.clone(), None))
            .collect();

        let core = Arc::new(PollerCore {
            device: device.into(),
            adapter,
            schedule,
            pending: PendingWrites::new(),
            last_polled: Mutex::new(last_polled),
            cache: Mutex::new(cache),
            communication: Mutex::new(CommunicationStatus::Disabled),
            communication_state_callback,
            component_state_callback,
        });

        Self {
            core,
            poll_rate,
            polling_task: None,
        }
    }

    /// Start the polling task.
    pub async fn start(&mut self) -> Result<()> {
        if self.polling_task.is_some() {
            return Ok(()); // Already running
        }
        if self.poll_rate.is_zero() {
            return Err(LinkError::config("poll rate must be greater than zero"));
        }

        self.core
            .set_communication_status(CommunicationStatus::NotEstablished);

        let core = Arc::clone(&self.core);
        let poll_rate = self.poll_rate;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_rate);
            loop {
                ticker.tick().await;
                core.execute_cycle().await;
            }
        });

        self.polling_task = Some(handle);
        info!("[{}] polling started", self.core.device);
        Ok(())
    }

    /// Stop the polling task.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.polling_task.take() {
            handle.abort();
            self.core
                .set_communication_status(CommunicationStatus::Disabled);
            info!("[{}] polling stopped", self.core.device);
        }
        Ok(())
    }

    /// Check if the polling task is active
    pub fn is_running(&self) -> bool {
        self.polling_task
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn enqueue_write(&self, name: &str, value: AttrValue) -> Result<()> {
        self.core.enqueue_write(name, value)
    }

    pub fn reading(&self, name: &str) -> Option<AttrReading> {
        self.core.reading(name)
    }

    pub fn communication_status(&self) -> CommunicationStatus {
        self.core.communication_status()
    }

    /// Shared handle to the engine state, e.g. for control-plane accessors
    pub fn core(&self) -> Arc<PollerCore<A>> {
        Arc::clone(&self.core)
    }
}
