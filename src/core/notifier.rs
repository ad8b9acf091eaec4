//! Threshold crossing detection with hysteresis.
//!
//! A threshold fires once when usage reaches it and stays silent until usage
//! has dropped more than [`HYSTERESIS_POINTS`] below it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::models::usage::{PrimaryMetric, UsageSnapshot};

pub const DEFAULT_THRESHOLDS: [u32; 4] = [50, 75, 90, 100];
pub const HYSTERESIS_POINTS: f64 = 10.0;
/// Thresholds at or above this are reported as high severity.
pub const HIGH_SEVERITY_FROM: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Standard,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossingEvent {
    pub threshold: u32,
    pub percent: f64,
    pub metric: PrimaryMetric,
    pub severity: Severity,
}

impl CrossingEvent {
    pub fn message(&self) -> String {
        format!(
            "Claude {} usage at {}% (threshold: {}%)",
            self.metric.long_label(),
            self.percent.round(),
            self.threshold
        )
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdNotifier {
    thresholds: Vec<u32>,
    metric: PrimaryMetric,
    notified: BTreeSet<u32>,
}

impl ThresholdNotifier {
    pub fn new(thresholds: &[u32], metric: PrimaryMetric) -> Self {
        Self {
            thresholds: normalized(thresholds),
            metric,
            notified: BTreeSet::new(),
        }
    }

    /// Feed one snapshot, returning the thresholds newly crossed, lowest first.
    pub fn check(&mut self, snapshot: &UsageSnapshot) -> Vec<CrossingEvent> {
        let percent = snapshot.window(self.metric).percent;

        let mut events = Vec::new();
        for &threshold in &self.thresholds {
            if percent >= f64::from(threshold) && self.notified.insert(threshold) {
                events.push(CrossingEvent {
                    threshold,
                    percent,
                    metric: self.metric,
                    severity: if threshold >= HIGH_SEVERITY_FROM {
                        Severity::High
                    } else {
                        Severity::Standard
                    },
                });
            }
        }

        self.notified
            .retain(|&t| percent >= f64::from(t) - HYSTERESIS_POINTS);

        events
    }

    /// Forget crossing history; used when a different token takes over.
    pub fn reset(&mut self) {
        self.notified.clear();
    }

    /// Swap the threshold list and metric. History for thresholds that are
    /// still configured is kept.
    pub fn reconfigure(&mut self, thresholds: &[u32], metric: PrimaryMetric) {
        if metric != self.metric {
            self.notified.clear();
        }
        self.thresholds = normalized(thresholds);
        self.metric = metric;
        let configured = &self.thresholds;
        self.notified.retain(|t| configured.contains(t));
    }

    pub fn notified(&self) -> impl Iterator<Item = u32> + '_ {
        self.notified.iter().copied()
    }
}

fn normalized(thresholds: &[u32]) -> Vec<u32> {
    let mut sorted = thresholds.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}
