//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Fixed-period scheduler driving simulation steps."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::{TickOutcome, TwinEngine};

/// Periodic driver for [`TwinEngine::tick`].
///
/// Steps run one at a time on a single task, so a slow step delays the next
/// one instead of overlapping it. While the engine is shut down the clock
/// parks on the engine's run gate and resumes a full period after a restart.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    period: Duration,
}

impl SimulationClock {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn for_engine(engine: &TwinEngine) -> Self {
        Self::new(engine.tick_interval())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking `engine` on the current tokio runtime.
    pub fn spawn(self, engine: Arc<TwinEngine>) -> ClockHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let run_state = engine.run_state();
        let task = tokio::spawn(run_clock(engine, self.period, run_state.clone(), stop_rx));
        info!(period_ms = self.period.as_millis() as u64, "simulation clock started");
        ClockHandle {
            stop: Some(stop_tx),
            run_state,
            task,
        }
    }
}

/// Control handle for a spawned clock; dropping it stops the clock.
#[derive(Debug)]
pub struct ClockHandle {
    stop: Option<oneshot::Sender<()>>,
    run_state: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ClockHandle {
    /// True while the clock task is alive and the engine accepts ticks.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished() && *self.run_state.borrow()
    }

    /// Stop the clock and wait for the in-flight step, if any, to finish.
    pub async fn stop(mut self) -> Result<(), JoinError> {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await
    }
}

fn period_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_clock(
    engine: Arc<TwinEngine>,
    period: Duration,
    mut run_state: watch::Receiver<bool>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut interval = period_interval(period);
    loop {
        if !*run_state.borrow_and_update() {
            debug!("simulation clock parked");
            tokio::select! {
                _ = &mut stop => break,
                changed = run_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    interval.reset();
                    continue;
                }
            }
        }

        tokio::select! {
            _ = &mut stop => break,
            changed = run_state.changed() => {
                if changed.is_err() {
                    break;
                }
                // A shutdown and restart can both land between two polls;
                // an open gate here still means a restart happened.
                if *run_state.borrow_and_update() {
                    interval.reset();
                }
            }
            _ = interval.tick() => {
                if let TickOutcome::Shutdown(_, reading) = engine.tick() {
                    info!(lifetime_health = reading.lifetime_health, "health depleted; clock parking");
                }
            }
        }
    }
    debug!("simulation clock stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBroadcaster;
    use arm_twin_common::config::{HealthConfig, SimulationConfig};

    fn engine() -> Arc<TwinEngine> {
        let simulation = SimulationConfig {
            random_seed: Some(99),
            ..SimulationConfig::default()
        };
        Arc::new(TwinEngine::new(
            &simulation,
            HealthConfig::default(),
            EventBroadcaster::new(16),
            None,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let engine = engine();
        let clock = SimulationClock::for_engine(&engine).spawn(engine.clone());
        assert!(clock.is_running());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(engine.status().ticks, 3);

        clock.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(engine.status().ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn parks_while_shut_down_and_rearms_on_restart() {
        let engine = engine();
        let clock = SimulationClock::new(Duration::from_secs(3)).spawn(engine.clone());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(engine.status().ticks, 1);

        engine.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!clock.is_running());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(engine.status().ticks, 1);

        engine.restart();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(engine.status().ticks, 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.status().ticks, 2);
        assert!(clock.is_running());

        clock.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_shutdown_and_restart_rearms_full_period() {
        let engine = engine();
        let clock = SimulationClock::new(Duration::from_secs(3)).spawn(engine.clone());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        engine.shutdown();
        engine.restart();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.status().ticks, 0);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(engine.status().ticks, 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.status().ticks, 1);
        assert!(clock.is_running());

        clock.stop().await.unwrap();
    }
}
