//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Per-channel drift rules and their fault-degraded variants."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
//! Declarative rule table for the telemetry random walk.
//!
//! Every channel has a nominal [`Drift`] and a [`SeedPattern`]. Channels tied
//! to a fault channel additionally carry a degraded drift that replaces the
//! nominal one while that fault is not OK.

use rand::Rng;

use crate::faults::{FaultChannel, FaultRegistry};
use crate::frames::{Channel, TelemetryFrame};

/// How a channel moves from one tick to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drift {
    /// Symmetric perturbation of total width `spread`, clamped to `[min, max]`.
    Walk { spread: f64, min: f64, max: f64 },
    /// Upward-only step in `[0, step)`, capped at `ceiling`.
    Rise { step: f64, ceiling: f64 },
    /// Downward-only step in `[0, step)`, floored at `floor`.
    Fall { step: f64, floor: f64 },
}

impl Drift {
    pub fn apply<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let unit: f64 = rng.gen();
        match *self {
            Drift::Walk { spread, min, max } => (value + (unit - 0.5) * spread).clamp(min, max),
            Drift::Rise { step, ceiling } => (value + unit * step).min(ceiling),
            Drift::Fall { step, floor } => (value - unit * step).max(floor),
        }
    }

    /// Inclusive range the drift can ever produce, used to bound seeded values.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Drift::Walk { min, max, .. } => (min, max),
            Drift::Rise { ceiling, .. } => (f64::NEG_INFINITY, ceiling),
            Drift::Fall { floor, .. } => (floor, f64::INFINITY),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wave {
    Sin,
    Cos,
}

/// Shape of the synthetic history produced at startup and on restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedPattern {
    /// `base + amplitude * wave(index * rate)`.
    Wave {
        base: f64,
        amplitude: f64,
        rate: f64,
        wave: Wave,
    },
    /// `base` plus uniform noise of total width `spread`.
    Jitter { base: f64, spread: f64 },
}

impl SeedPattern {
    pub fn sample<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> f64 {
        match *self {
            SeedPattern::Wave {
                base,
                amplitude,
                rate,
                wave,
            } => {
                let phase = index as f64 * rate;
                let shape = match wave {
                    Wave::Sin => phase.sin(),
                    Wave::Cos => phase.cos(),
                };
                base + amplitude * shape
            }
            SeedPattern::Jitter { base, spread } => {
                let unit: f64 = rng.gen();
                base + (unit - 0.5) * spread
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRule {
    pub channel: Channel,
    pub seed: SeedPattern,
    pub nominal: Drift,
    pub degraded: Option<(FaultChannel, Drift)>,
}

impl ChannelRule {
    fn new(channel: Channel, seed: SeedPattern, nominal: Drift) -> Self {
        Self {
            channel,
            seed,
            nominal,
            degraded: None,
        }
    }

    fn degraded_by(mut self, fault: FaultChannel, drift: Drift) -> Self {
        self.degraded = Some((fault, drift));
        self
    }

    /// Drift in effect for the given fault state.
    pub fn drift(&self, faults: &FaultRegistry) -> Drift {
        match self.degraded {
            Some((fault, drift)) if faults.is_active(fault) => drift,
            _ => self.nominal,
        }
    }
}

fn sin(base: f64, amplitude: f64, rate: f64) -> SeedPattern {
    SeedPattern::Wave {
        base,
        amplitude,
        rate,
        wave: Wave::Sin,
    }
}

fn cos(base: f64, amplitude: f64, rate: f64) -> SeedPattern {
    SeedPattern::Wave {
        base,
        amplitude,
        rate,
        wave: Wave::Cos,
    }
}

fn walk(spread: f64, min: f64, max: f64) -> Drift {
    Drift::Walk { spread, min, max }
}

/// Ordered rule set covering every [`Channel`] exactly once.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<ChannelRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleTable {
    /// Rule set for the six-axis arm.
    pub fn standard() -> Self {
        use Channel::*;
        let rules = vec![
            ChannelRule::new(J1Angle, sin(45.0, 15.0, 0.3), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J2Angle, cos(60.0, 20.0, 0.4), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J3Angle, sin(30.0, 10.0, 0.5), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J4Angle, sin(90.0, 12.0, 0.35), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J5Angle, cos(120.0, 18.0, 0.45), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J6Angle, sin(180.0, 14.0, 0.55), walk(8.0, 0.0, 360.0)),
            ChannelRule::new(J1Torque, sin(50.0, 15.0, 0.6), walk(5.0, 0.0, 120.0)).degraded_by(
                FaultChannel::TorqueImbalance,
                Drift::Rise {
                    step: 10.0,
                    ceiling: 200.0,
                },
            ),
            ChannelRule::new(J2Torque, cos(45.0, 12.0, 0.5), walk(5.0, 0.0, 120.0)),
            ChannelRule::new(J3Torque, sin(40.0, 10.0, 0.7), walk(5.0, 0.0, 120.0)),
            ChannelRule::new(EeX, sin(500.0, 100.0, 0.3), walk(20.0, 0.0, 1000.0)),
            ChannelRule::new(EeY, cos(300.0, 80.0, 0.4), walk(20.0, 0.0, 800.0)),
            ChannelRule::new(EeZ, sin(200.0, 60.0, 0.5), walk(20.0, 0.0, 600.0)),
            ChannelRule::new(MotorTemp, sin(65.0, 10.0, 0.2), walk(5.0, 50.0, 85.0)).degraded_by(
                FaultChannel::Overheating,
                Drift::Rise {
                    step: 2.0,
                    ceiling: 95.0,
                },
            ),
            ChannelRule::new(Power, sin(1500.0, 300.0, 0.4), walk(200.0, 1000.0, 2200.0))
                .degraded_by(FaultChannel::PowerFluctuation, walk(400.0, 0.0, 4000.0)),
            ChannelRule::new(Current, sin(8.5, 2.0, 0.5), walk(0.8, 7.0, 11.0)),
            ChannelRule::new(Rpm, sin(1200.0, 200.0, 0.6), walk(150.0, 800.0, 1500.0)).degraded_by(
                FaultChannel::EncoderLoss,
                Drift::Fall {
                    step: 100.0,
                    floor: 0.0,
                },
            ),
            ChannelRule::new(Payload, sin(5.2, 1.5, 0.3), walk(0.5, 3.0, 8.0)).degraded_by(
                FaultChannel::GripperMalfunction,
                Drift::Fall {
                    step: 2.0,
                    floor: 0.0,
                },
            ),
            ChannelRule::new(
                CycleTime,
                SeedPattern::Jitter {
                    base: 2.5,
                    spread: 0.3,
                },
                walk(0.3, 2.0, 3.5),
            )
            .degraded_by(
                FaultChannel::CommDelay,
                Drift::Rise {
                    step: 0.5,
                    ceiling: 10.0,
                },
            ),
            ChannelRule::new(AnomalyScore, sin(0.15, 0.1, 0.8), walk(0.1, 0.0, 1.0)),
        ];
        Self { rules }
    }

    pub fn rule(&self, channel: Channel) -> Option<&ChannelRule> {
        self.rules.iter().find(|rule| rule.channel == channel)
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    /// Advance every channel of `previous` by one step.
    pub fn step<R: Rng + ?Sized>(
        &self,
        previous: &TelemetryFrame,
        faults: &FaultRegistry,
        rng: &mut R,
        frame: &mut TelemetryFrame,
    ) {
        for rule in &self.rules {
            let value = rule.drift(faults).apply(previous.get(rule.channel), rng);
            frame.set(rule.channel, value);
        }
    }

    /// Fill `frame` with the seeded history value at `index`, bounded by the nominal range.
    pub fn seed<R: Rng + ?Sized>(&self, index: usize, rng: &mut R, frame: &mut TelemetryFrame) {
        for rule in &self.rules {
            let (min, max) = rule.nominal.bounds();
            let value = rule.seed.sample(index, rng).clamp(min, max);
            frame.set(rule.channel, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn standard_table_covers_each_channel_once() {
        let table = RuleTable::standard();
        let channels: HashSet<Channel> = table.rules().iter().map(|r| r.channel).collect();
        assert_eq!(channels.len(), Channel::ALL.len());
        assert_eq!(table.rules().len(), Channel::ALL.len());
    }

    #[test]
    fn every_fault_channel_degrades_some_channel() {
        let table = RuleTable::standard();
        for fault in FaultChannel::ALL {
            assert!(
                table
                    .rules()
                    .iter()
                    .any(|rule| matches!(rule.degraded, Some((f, _)) if f == fault)),
                "{fault} has no degraded rule"
            );
        }
    }

    #[test]
    fn nominal_walks_have_ordered_bounds() {
        for rule in RuleTable::standard().rules() {
            let Drift::Walk { spread, min, max } = rule.nominal else {
                panic!("{} nominal drift must be a clamped walk", rule.channel);
            };
            assert!(spread > 0.0 && min < max, "{}", rule.channel);
        }
    }

    #[test]
    fn rise_never_decreases_and_respects_ceiling() {
        let mut rng = StdRng::seed_from_u64(3);
        let drift = Drift::Rise {
            step: 2.0,
            ceiling: 95.0,
        };
        let mut value = 90.0;
        for _ in 0..50 {
            let next = drift.apply(value, &mut rng);
            assert!(next >= value && next <= 95.0);
            value = next;
        }
    }

    #[test]
    fn fall_never_increases_and_respects_floor() {
        let mut rng = StdRng::seed_from_u64(4);
        let drift = Drift::Fall {
            step: 100.0,
            floor: 0.0,
        };
        let mut value = 300.0;
        for _ in 0..50 {
            let next = drift.apply(value, &mut rng);
            assert!(next <= value && next >= 0.0);
            value = next;
        }
        assert!(value < 300.0);
    }

    #[test]
    fn active_fault_selects_degraded_drift() {
        let table = RuleTable::standard();
        let rule = table.rule(Channel::MotorTemp).unwrap();
        let mut faults = FaultRegistry::new();
        assert!(matches!(rule.drift(&faults), Drift::Walk { .. }));
        faults.toggle(FaultChannel::Overheating);
        assert!(matches!(rule.drift(&faults), Drift::Rise { ceiling, .. } if ceiling == 95.0));
        faults.toggle(FaultChannel::Overheating);
        assert!(matches!(rule.drift(&faults), Drift::Rise { .. }));
    }

    #[test]
    fn seeded_values_stay_within_nominal_bounds() {
        let table = RuleTable::standard();
        let mut rng = StdRng::seed_from_u64(11);
        let mut frame = TelemetryFrame::zeroed(Utc::now());
        for index in 0..40 {
            table.seed(index, &mut rng, &mut frame);
            for rule in table.rules() {
                let (min, max) = rule.nominal.bounds();
                let value = frame.get(rule.channel);
                assert!(value >= min && value <= max, "{} = {value}", rule.channel);
            }
        }
    }
}
