//! Synthetic data producer.
//!
//! Each simulation is a tokio task ticking at its scenario's interval until
//! its duration elapses or it is stopped. Every tick publishes one payload to
//! the data subscribers; every tenth tick also publishes a progress summary to
//! the metrics subscribers.

mod payloads;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use pushbench_core::{clock, SimulationId};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use payloads::Tick;

/// Ticks between metrics summaries.
const METRICS_EVERY: u64 = 10;

/// Built-in data scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    StockPrices,
    SocialFeed,
    SystemMetrics,
    ChatMessages,
    IotSensors,
    HighFrequency,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Self::StockPrices,
        Self::SocialFeed,
        Self::SystemMetrics,
        Self::ChatMessages,
        Self::IotSensors,
        Self::HighFrequency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StockPrices => "stock-prices",
            Self::SocialFeed => "social-feed",
            Self::SystemMetrics => "system-metrics",
            Self::ChatMessages => "chat-messages",
            Self::IotSensors => "iot-sensors",
            Self::HighFrequency => "high-frequency",
        }
    }

    /// Time between generated payloads.
    pub fn interval(self) -> Duration {
        let ms = match self {
            Self::StockPrices => 1000,
            Self::SocialFeed => 2000,
            Self::SystemMetrics => 5000,
            Self::ChatMessages => 500,
            Self::IotSensors => 3000,
            Self::HighFrequency => 100,
        };
        Duration::from_millis(ms)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}

/// A running simulation, as listed by the API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInfo {
    pub id: SimulationId,
    #[serde(rename = "type")]
    pub kind: String,
    pub scenario: Scenario,
    pub message_count: u64,
    /// Milliseconds since start.
    pub uptime: u64,
    /// Configured run time in milliseconds.
    pub duration: u64,
}

type Subscriber = Arc<dyn Fn(&Value) + Send + Sync>;

struct Simulation {
    kind: String,
    scenario: Scenario,
    started: Instant,
    duration: Duration,
    message_count: Arc<AtomicU64>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ProducerInner {
    simulations: DashMap<SimulationId, Simulation>,
    data_subscribers: RwLock<Vec<Subscriber>>,
    metrics_subscribers: RwLock<Vec<Subscriber>>,
    current: RwLock<Option<Value>>,
}

impl ProducerInner {
    fn publish(subscribers: &RwLock<Vec<Subscriber>>, payload: &Value) {
        let subscribers: Vec<Subscriber> = subscribers.read().clone();
        for subscriber in subscribers {
            subscriber(payload);
        }
    }
}

/// Generates scenario payloads and hands them to subscribers.
#[derive(Clone, Default)]
pub struct ScenarioProducer {
    inner: Arc<ProducerInner>,
}

impl ScenarioProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a simulation. Must be called inside a tokio runtime.
    ///
    /// `kind` is a free-form label echoed in listings and metrics summaries.
    pub fn start_simulation(
        &self,
        kind: &str,
        scenario: &str,
        duration: Duration,
    ) -> Result<SimulationId, ScenarioError> {
        let scenario: Scenario = scenario.parse()?;
        let id = SimulationId::new();
        let message_count = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let _ = self.inner.simulations.insert(
            id.clone(),
            Simulation {
                kind: kind.to_owned(),
                scenario,
                started,
                duration,
                message_count: message_count.clone(),
                cancel: cancel.clone(),
            },
        );
        info!(sim_id = %id, %scenario, kind, duration_ms = duration.as_millis() as u64, "simulation started");

        let run = SimulationRun {
            id: id.clone(),
            kind: kind.to_owned(),
            scenario,
            started,
            started_at: clock::now_millis(),
            duration,
            message_count,
            cancel,
            inner: self.inner.clone(),
        };
        drop(tokio::spawn(run.drive()));
        Ok(id)
    }

    /// Stop one simulation. Returns false when the id is not running.
    pub fn stop_simulation(&self, id: &SimulationId) -> bool {
        match self.inner.simulations.remove(id) {
            Some((_, sim)) => {
                sim.cancel.cancel();
                info!(sim_id = %id, "simulation stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let ids: Vec<SimulationId> = self.inner.simulations.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            if let Some((_, sim)) = self.inner.simulations.remove(id) {
                sim.cancel.cancel();
            }
        }
        info!(count = ids.len(), "all simulations stopped");
    }

    /// Most recent payload from any simulation.
    pub fn current_data(&self) -> Option<Value> {
        self.inner.current.read().clone()
    }

    pub fn active_simulations(&self) -> Vec<SimulationInfo> {
        self.inner
            .simulations
            .iter()
            .map(|entry| {
                let sim = entry.value();
                SimulationInfo {
                    id: entry.key().clone(),
                    kind: sim.kind.clone(),
                    scenario: sim.scenario,
                    message_count: sim.message_count.load(Ordering::Relaxed),
                    uptime: sim.started.elapsed().as_millis() as u64,
                    duration: sim.duration.as_millis() as u64,
                }
            })
            .collect()
    }

    pub fn subscribe_data(&self, subscriber: impl Fn(&Value) + Send + Sync + 'static) {
        self.inner.data_subscribers.write().push(Arc::new(subscriber));
    }

    pub fn subscribe_metrics(&self, subscriber: impl Fn(&Value) + Send + Sync + 'static) {
        self.inner.metrics_subscribers.write().push(Arc::new(subscriber));
    }

    /// Publish an externally produced payload as if a simulation had generated it.
    pub fn publish_data(&self, payload: Value) {
        ProducerInner::publish(&self.inner.data_subscribers, &payload);
        *self.inner.current.write() = Some(payload);
    }
}

struct SimulationRun {
    id: SimulationId,
    kind: String,
    scenario: Scenario,
    started: Instant,
    started_at: i64,
    duration: Duration,
    message_count: Arc<AtomicU64>,
    cancel: CancellationToken,
    inner: Arc<ProducerInner>,
}

impl SimulationRun {
    async fn drive(self) {
        let period = self.scenario.interval();
        let mut ticker = time::interval_at(self.started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = time::sleep_until(self.started + self.duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = &mut deadline => {
                    debug!(sim_id = %self.id, "simulation duration elapsed");
                    break;
                }
                _ = ticker.tick() => self.tick(),
            }
        }

        if self.inner.simulations.remove(&self.id).is_some() {
            info!(
                sim_id = %self.id,
                messages = self.message_count.load(Ordering::Relaxed),
                "simulation finished"
            );
        }
    }

    fn tick(&self) {
        let sequence = self.message_count.load(Ordering::Relaxed) + 1;
        let now = clock::now_millis();
        let payload = {
            let mut rng = rand::thread_rng();
            payloads::generate(
                self.scenario,
                &Tick {
                    sequence,
                    simulation_id: self.id.as_str(),
                    started_at: self.started_at,
                    now,
                },
                &mut rng,
            )
        };
        *self.inner.current.write() = Some(payload.clone());
        self.message_count.store(sequence, Ordering::Relaxed);
        ProducerInner::publish(&self.inner.data_subscribers, &payload);

        if sequence % METRICS_EVERY == 0 {
            let uptime_ms = self.started.elapsed().as_millis() as u64;
            let rate = if uptime_ms == 0 {
                0.0
            } else {
                sequence as f64 / (uptime_ms as f64 / 1000.0)
            };
            let summary = json!({
                "scenario": self.scenario,
                "type": self.kind,
                "messageCount": sequence,
                "uptime": uptime_ms,
                "messagesPerSecond": rate,
            });
            ProducerInner::publish(&self.inner.metrics_subscribers, &summary);
        }
    }
}
