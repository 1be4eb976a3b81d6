use rand::{rngs::StdRng, Rng, SeedableRng};
use simtel_ingest_core::*;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub tick: Duration,          // time between samples
    pub pause_backoff: Duration, // re-check period while paused
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { tick: Duration::from_millis(1000), pause_backoff: Duration::from_millis(500) }
    }
}

/// Value ranges for generated samples. Pedal ranges are in hundredths so the
/// fractions come out with exactly two decimals and never hit the upper bound.
#[derive(Clone, Debug)]
pub struct SampleRanges {
    pub speed: Range<i32>,
    pub rpm: Range<i32>,
    pub gear: RangeInclusive<i32>,
    pub throttle_cents: Range<u32>,
    pub brake_cents: Range<u32>,
}

impl SampleRanges {
    /// Ranges used by the dashboard's own simulated feed.
    pub fn simulated() -> Self {
        Self {
            speed: 100..250,
            rpm: 5000..9000,
            gear: 1..=6,
            throttle_cents: 0..100,
            brake_cents: 0..50,
        }
    }

    /// Ranges used by the standalone UDP sender.
    pub fn sender() -> Self {
        Self {
            speed: 100..300,
            rpm: 4000..9000,
            gear: 1..=5,
            throttle_cents: 0..100,
            brake_cents: 0..40,
        }
    }
}

pub struct SampleGenerator {
    rng: StdRng,
    ranges: SampleRanges,
}

impl SampleGenerator {
    pub fn new(ranges: SampleRanges) -> Self {
        Self { rng: StdRng::from_os_rng(), ranges }
    }

    pub fn seeded(ranges: SampleRanges, seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), ranges }
    }

    /// Fresh sample stamped with the current time. `speed_override` replaces
    /// the random speed verbatim.
    pub fn generate(&mut self, speed_override: Option<i32>) -> TelemetrySample {
        let r = &self.ranges;
        let random_speed = self.rng.random_range(r.speed.clone());
        TelemetrySample {
            speed: speed_override.unwrap_or(random_speed),
            rpm: self.rng.random_range(r.rpm.clone()),
            gear: self.rng.random_range(r.gear.clone()),
            throttle: self.rng.random_range(r.throttle_cents.clone()) as f64 / 100.0,
            brake: self.rng.random_range(r.brake_cents.clone()) as f64 / 100.0,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Timer-driven synthetic feed.
pub struct SimulatedSource {
    cfg: SimConfig,
    control: Arc<ControlState>,
    generator: SampleGenerator,
    // wait owed before the next tick: a full tick after a sample, the
    // shorter backoff after a paused check
    pending: Option<Duration>,
}

impl SimulatedSource {
    pub fn new(cfg: SimConfig, control: Arc<ControlState>) -> Self {
        Self::with_generator(cfg, control, SampleGenerator::new(SampleRanges::simulated()))
    }

    pub fn with_generator(cfg: SimConfig, control: Arc<ControlState>, generator: SampleGenerator) -> Self {
        info!(tick_ms = cfg.tick.as_millis() as u64, "Simulated source ready");
        Self { cfg, control, generator, pending: None }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for SimulatedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }

    async fn next_sample(&mut self) -> Option<TelemetrySample> {
        loop {
            if let Some(wait) = self.pending.take() {
                if !self.control.sleep(wait).await {
                    break;
                }
            }
            if !self.control.is_running() {
                break;
            }
            if self.control.is_paused() {
                self.pending = Some(self.cfg.pause_backoff);
                continue;
            }
            let sample = self.generator.generate(self.control.speed_override());
            self.pending = Some(self.cfg.tick);
            return Some(sample);
        }
        debug!("Simulated source stopped");
        None
    }
}
