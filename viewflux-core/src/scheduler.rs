//! Periodic tick loop driving a [`Dispatcher`]
//!
//! One interval tick runs exactly one [`Dispatcher::tick`]. Ticks that fire
//! while a reducer is still running are delayed, not bunched up, so reducer
//! calls never overlap and never run back to back faster than the interval.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bus::AppEvent;
use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::error::DispatchError;
use crate::store::Middleware;

/// What the scheduler does after a tick returns a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalPolicy {
    /// Log it, emit [`AppEvent::Fatal`] and keep ticking
    #[default]
    Resume,
    /// Stop and return the error from [`Scheduler::run`]
    Halt,
}

/// Configuration for the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period between ticks.
    pub tick_interval: Duration,
    pub fatal_policy: FatalPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1) / 60,
            fatal_policy: FatalPolicy::Resume,
        }
    }
}

/// Single-consumer loop over the action queue
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tick until cancelled
    pub async fn run<S: 'static, M: Middleware>(
        &self,
        dispatcher: &mut Dispatcher<S, M>,
    ) -> Result<(), DispatchError> {
        self.run_with(dispatcher, |_| {}).await
    }

    /// Tick until cancelled, calling `after_tick` with every tick result
    ///
    /// The host uses `after_tick` to pump views and redraw. With
    /// [`FatalPolicy::Halt`] it still sees the failing tick before `run_with`
    /// returns.
    pub async fn run_with<S, M, F>(
        &self,
        dispatcher: &mut Dispatcher<S, M>,
        mut after_tick: F,
    ) -> Result<(), DispatchError>
    where
        S: 'static,
        M: Middleware,
        F: FnMut(&Result<TickOutcome, DispatchError>),
    {
        let mut interval = time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.config.tick_interval, "Scheduler started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Scheduler cancelled");
                    return Ok(());
                }
                _ = interval.tick() => {
                    let result = dispatcher.tick();
                    after_tick(&result);

                    if let Err(err) = result {
                        error!(error = %err, "Fatal dispatch error");
                        match self.config.fatal_policy {
                            FatalPolicy::Resume => {
                                dispatcher.bus().emit(AppEvent::Fatal(err.to_string()));
                            }
                            FatalPolicy::Halt => return Err(err),
                        }
                    }
                }
            }
        }
    }
}
