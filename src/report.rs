//! Hooks for the statistics and analytics services that live outside the trainer.

use std::time::Duration;

use crate::notes::MidiNote;
use crate::session::SessionEffects;
use crate::theory::KeySignature;

pub const ANALYTICS_CATEGORY: &str = "PitchReading";

/// One played chord, as registered with the statistics service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticEvent {
    pub success: bool,
    pub keys: Vec<MidiNote>,
    pub key_signature: KeySignature,
    pub time: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyticsEvent {
    pub category: &'static str,
    pub action: &'static str,
}

impl AnalyticsEvent {
    pub fn success() -> Self {
        Self {
            category: ANALYTICS_CATEGORY,
            action: "success",
        }
    }

    pub fn failure() -> Self {
        Self {
            category: ANALYTICS_CATEGORY,
            action: "failure",
        }
    }
}

pub trait StatisticService {
    fn register(&mut self, event: StatisticEvent);
}

/// Fire and forget.
pub trait AnalyticsService {
    fn send_event(&mut self, category: &str, action: &str);
}

/// Forward the reportable parts of `effects` to the services.
pub fn dispatch_effects(
    effects: &SessionEffects,
    statistics: &mut dyn StatisticService,
    analytics: &mut dyn AnalyticsService,
) {
    for event in &effects.statistics {
        statistics.register(event.clone());
    }
    for event in &effects.analytics {
        analytics.send_event(event.category, event.action);
    }
}

/// Keeps every registered event in memory.
#[derive(Debug, Default)]
pub struct StatisticLog {
    pub events: Vec<StatisticEvent>,
}

impl StatisticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> usize {
        self.events.iter().filter(|e| e.success).count()
    }

    pub fn failures(&self) -> usize {
        self.events.len() - self.successes()
    }

    pub fn mean_success_time(&self) -> Option<Duration> {
        let times: Vec<Duration> = self
            .events
            .iter()
            .filter(|e| e.success)
            .map(|e| e.time)
            .collect();
        let count = u32::try_from(times.len()).ok().filter(|&n| n > 0)?;
        Some(times.iter().sum::<Duration>() / count)
    }
}

impl StatisticService for StatisticLog {
    fn register(&mut self, event: StatisticEvent) {
        self.events.push(event);
    }
}

/// Writes analytics events to the log instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct LogAnalytics;

impl AnalyticsService for LogAnalytics {
    fn send_event(&mut self, category: &str, action: &str) {
        log::info!("analytics: {category}/{action}");
    }
}
