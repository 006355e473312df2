//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Telemetry generator driven by the channel rule table."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::prelude::*;

use crate::faults::FaultRegistry;
use crate::frames::TelemetryFrame;
use crate::rules::RuleTable;

/// Produces telemetry frames as a fault-biased random walk.
#[derive(Debug)]
pub struct TelemetryGenerator {
    rng: StdRng,
    rules: RuleTable,
}

impl TelemetryGenerator {
    /// `Some(seed)` gives a reproducible stream; `None` draws from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_rules(seed, RuleTable::standard())
    }

    pub fn with_rules(seed: Option<u64>, rules: RuleTable) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Next frame stamped with the current wall-clock time.
    pub fn next(&mut self, previous: &TelemetryFrame, faults: &FaultRegistry) -> TelemetryFrame {
        self.next_at(previous, faults, Utc::now())
    }

    pub fn next_at(
        &mut self,
        previous: &TelemetryFrame,
        faults: &FaultRegistry,
        timestamp: DateTime<Utc>,
    ) -> TelemetryFrame {
        let mut frame = TelemetryFrame::zeroed(timestamp);
        self.rules.step(previous, faults, &mut self.rng, &mut frame);
        frame
    }

    /// Smooth synthetic history of `count` frames spaced `period` apart, ending now.
    pub fn seed(&mut self, count: usize, period: Duration) -> Vec<TelemetryFrame> {
        self.seed_until(count, period, Utc::now())
    }

    pub fn seed_until(
        &mut self,
        count: usize,
        period: Duration,
        end: DateTime<Utc>,
    ) -> Vec<TelemetryFrame> {
        let step = chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::zero());
        (0..count)
            .map(|index| {
                let back = i32::try_from(count - 1 - index).unwrap_or(i32::MAX);
                let mut frame = TelemetryFrame::zeroed(end - step * back);
                self.rules.seed(index, &mut self.rng, &mut frame);
                frame
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::FaultChannel;

    fn baseline(generator: &mut TelemetryGenerator) -> TelemetryFrame {
        *generator
            .seed(20, Duration::from_secs(3))
            .last()
            .expect("seed produces frames")
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let faults = FaultRegistry::new();
        let stamp = Utc::now();
        let mut a = TelemetryGenerator::new(Some(42));
        let mut b = TelemetryGenerator::new(Some(42));
        let start = baseline(&mut a);
        baseline(&mut b);
        let frame_a = a.next_at(&start, &faults, stamp);
        let frame_b = b.next_at(&start, &faults, stamp);
        assert_eq!(frame_a, frame_b);
    }

    #[test]
    fn seed_history_is_evenly_spaced_and_ends_now() {
        let mut generator = TelemetryGenerator::new(Some(1));
        let end = Utc::now();
        let frames = generator.seed_until(20, Duration::from_secs(3), end);
        assert_eq!(frames.len(), 20);
        assert_eq!(frames[19].timestamp, end);
        assert_eq!(frames[0].timestamp, end - chrono::Duration::seconds(57));
        assert!((frames[0].j1_angle - 45.0).abs() < 1e-9);
    }

    #[test]
    fn nominal_channels_stay_clamped() {
        let mut generator = TelemetryGenerator::new(Some(9));
        let faults = FaultRegistry::new();
        let mut frame = baseline(&mut generator);
        for _ in 0..500 {
            frame = generator.next(&frame, &faults);
            assert!((50.0..=85.0).contains(&frame.motor_temp));
            assert!((1000.0..=2200.0).contains(&frame.power));
            assert!((800.0..=1500.0).contains(&frame.rpm));
            assert!((0.0..=1.0).contains(&frame.anomaly_score));
        }
    }

    #[test]
    fn overheating_drives_temperature_towards_ceiling() {
        let mut generator = TelemetryGenerator::new(Some(5));
        let mut faults = FaultRegistry::new();
        faults.toggle(FaultChannel::Overheating);
        let mut frame = baseline(&mut generator);
        for _ in 0..200 {
            let next = generator.next(&frame, &faults);
            assert!(next.motor_temp >= frame.motor_temp);
            assert!(next.motor_temp <= 95.0);
            frame = next;
        }
        assert!(frame.motor_temp > 90.0);
    }

    #[test]
    fn encoder_loss_drags_rpm_without_recovery() {
        let mut generator = TelemetryGenerator::new(Some(6));
        let mut faults = FaultRegistry::new();
        faults.toggle(FaultChannel::EncoderLoss);
        faults.toggle(FaultChannel::EncoderLoss);
        let mut frame = baseline(&mut generator);
        for _ in 0..100 {
            let next = generator.next(&frame, &faults);
            assert!(next.rpm <= frame.rpm);
            frame = next;
        }
        assert!(frame.rpm < 800.0);
        assert!(frame.rpm >= 0.0);
    }
}
