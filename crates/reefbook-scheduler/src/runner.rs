//! Sweep scheduling.
//!
//! Each sweep runs on its own interval in its own task. Missed ticks
//! are skipped rather than bunched, so a stalled store never produces a
//! burst of catch-up runs. All loops stop when the handle signals
//! shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use reefbook_core::clock::Clock;
use reefbook_core::directory::RecipientDirectory;
use reefbook_core::error::DomainError;
use reefbook_core::policy::BusinessPolicy;
use reefbook_ledger::store::{BookingStore, ExperienceStore};
use reefbook_notifications::store::NotificationStore;
use reefbook_realtime::hub::Hub;

use crate::health::ResourceSampler;
use crate::sweeps;
use crate::weather::WeatherProvider;

/// Sweep cadences.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Experience reminder cadence.
    pub reminder_interval: Duration,
    /// Overdue auto-completion cadence.
    pub auto_complete_interval: Duration,
    /// Payment reminder cadence.
    pub payment_reminder_interval: Duration,
    /// Growth update cadence.
    pub growth_interval: Duration,
    /// Notification cleanup cadence.
    pub cleanup_interval: Duration,
    /// Scheduled dispatch cadence.
    pub dispatch_interval: Duration,
    /// Weather polling cadence.
    pub weather_interval: Duration,
    /// Health sampling cadence.
    pub health_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_interval: Duration::from_secs(60 * 60),
            auto_complete_interval: Duration::from_secs(60 * 60),
            payment_reminder_interval: Duration::from_secs(24 * 60 * 60),
            growth_interval: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            dispatch_interval: Duration::from_secs(60),
            weather_interval: Duration::from_secs(6 * 60 * 60),
            health_interval: Duration::from_secs(30 * 60),
        }
    }
}

/// Everything the sweeps read and write. The hub doubles as the live
/// push port.
pub struct Scheduler {
    /// Sweep cadences.
    pub config: SchedulerConfig,
    /// Business thresholds the sweeps act on.
    pub policy: BusinessPolicy,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Booking persistence.
    pub bookings: Arc<dyn BookingStore>,
    /// Experience persistence.
    pub experiences: Arc<dyn ExperienceStore>,
    /// Notification persistence.
    pub notifications: Arc<dyn NotificationStore>,
    /// User lookup for admin alerts.
    pub directory: Arc<dyn RecipientDirectory>,
    /// Weather source for site monitoring.
    pub weather: Arc<dyn WeatherProvider>,
    /// Process memory source for health checks.
    pub sampler: Arc<dyn ResourceSampler>,
    /// Live connection hub.
    pub hub: Arc<Hub>,
}

/// Handle over the running sweep loops.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every sweep loop to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("scheduler stopped");
    }
}

impl Scheduler {
    /// Spawn all sweep loops. Each interval fires once immediately and
    /// then at its cadence.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, signal) = watch::channel(false);
        let config = self.config;
        let scheduler = Arc::new(self);

        let tasks = vec![
            spawn_sweep("experience_reminders", config.reminder_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::send_experience_reminders(
                            &*s.clock,
                            &*s.experiences,
                            &*s.bookings,
                            &*s.notifications,
                            &*s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
            spawn_sweep("auto_complete", config.auto_complete_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::auto_complete_overdue(
                            &*s.clock,
                            &*s.experiences,
                            &*s.bookings,
                            &*s.notifications,
                            &*s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
            spawn_sweep("payment_reminders", config.payment_reminder_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::send_payment_reminders(
                            &*s.clock,
                            &*s.bookings,
                            &*s.notifications,
                            &*s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
            spawn_sweep("growth_updates", config.growth_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::send_growth_updates(
                            &*s.clock,
                            &*s.bookings,
                            &*s.notifications,
                            &*s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
            spawn_sweep("notification_cleanup", config.cleanup_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move { sweeps::cleanup_notifications(&*s.clock, &*s.notifications).await }
                }
            }),
            spawn_sweep("scheduled_dispatch", config.dispatch_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::dispatch_scheduled(&*s.clock, &*s.notifications, &*s.hub).await
                    }
                }
            }),
            spawn_sweep("weather", config.weather_interval, signal.clone(), {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::monitor_weather(
                            &*s.clock,
                            &*s.experiences,
                            &*s.bookings,
                            &*s.notifications,
                            &*s.weather,
                            &s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
            spawn_sweep("system_health", config.health_interval, signal, {
                let s = Arc::clone(&scheduler);
                move || {
                    let s = Arc::clone(&s);
                    async move {
                        sweeps::check_system_health(
                            &*s.clock,
                            &*s.sampler,
                            &*s.directory,
                            &*s.notifications,
                            &*s.hub,
                            &s.policy,
                        )
                        .await
                    }
                }
            }),
        ];

        tracing::info!(sweeps = tasks.len(), "scheduler started");
        SchedulerHandle { shutdown, tasks }
    }
}

fn spawn_sweep<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut sweep: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<u64, DomainError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if let Err(error) = sweep().await {
                        tracing::error!(sweep = name, error = %error, "sweep failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!(sweep = name, "sweep loop stopped");
    })
}
