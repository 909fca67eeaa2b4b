//! High-severity escalation.
//!
//! When the policy level of an analysis reaches "Level 5" the draft step
//! hands the case to a [`Notifier`]. Nothing is actually dispatched: the
//! shipped [`SimulatedPager`] only narrates the paging sequence.

use crate::models::{Analysis, Report};
use crate::pipeline::progress::{Pacing, ProgressSink, Style};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Policy level marker that triggers escalation.
pub const ESCALATION_LEVEL: &str = "Level 5";

/// Whether an analysis requires escalation.
pub fn requires_alert(analysis: &Analysis) -> bool {
    analysis.policy_level.contains(ESCALATION_LEVEL)
}

/// Receives escalations for critical cases.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn escalate(&self, report: &Report, analysis: &Analysis);
}

/// Ignores escalations.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn escalate(&self, _report: &Report, _analysis: &Analysis) {}
}

/// Narrates an on-call paging sequence to a progress sink.
pub struct SimulatedPager {
    sink: Arc<dyn ProgressSink>,
    pacing: Pacing,
}

impl SimulatedPager {
    pub fn new(sink: Arc<dyn ProgressSink>, pacing: Pacing) -> Self {
        Self { sink, pacing }
    }
}

#[async_trait]
impl Notifier for SimulatedPager {
    async fn escalate(&self, report: &Report, analysis: &Analysis) {
        warn!(
            "{} escalation for {} ({})",
            analysis.policy_level, report.id, report.patient_name
        );

        self.sink
            .emit("🚨 LEVEL 5 ALERT DETECTED - INITIATING PROTOCOL", Style::Alert);
        self.sink.emit(">> VoIP Dialing Dr. Smith (On-Call)...", Style::Warning);
        self.pacing.pause(1000).await;
        self.sink.emit(">> Sending SMS to Chief Resident...", Style::Warning);
        self.pacing.pause(1000).await;
        self.sink.emit(">> Connection Established.", Style::Step);
    }
}
