//! Report processing pipeline.
//!
//! Three steps run in sequence for every pending report:
//!
//! ```text
//! fetch ──▶ analyze ──▶ draft ──┐
//!   │          ▲                │
//!   │          └── queue left ──┤
//!   └────────── queue empty ────┴──▶ end
//! ```
//!
//! The batch command walks this graph until the pending queue drains; the
//! HTTP service runs a single analyze + draft cycle per request.

pub mod progress;

use crate::agent::AnalysisEngine;
use crate::models::{Analysis, Report};
use crate::note::{requires_alert, Note, NoteComposer, Notifier};
use crate::policy::PolicyProvider;
use crate::store::ReportStore;
use progress::{Pacing, ProgressSink, Style};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Failure while drafting a note.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to save clinical note for {patient}: {source:#}")]
    Persist {
        patient: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A drafted and saved note.
#[derive(Debug, Clone)]
pub struct Drafted {
    pub note: Note,
    pub path: PathBuf,
}

/// Nodes of the batch workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Analyze,
    Draft,
    End,
}

/// Working state carried between batch steps.
#[derive(Debug, Default)]
pub struct BatchState {
    pub pending: VecDeque<Report>,
    pub current: Option<(Report, Analysis)>,
    pub processed_count: usize,
}

/// Where to go after fetch or draft: keep going while reports remain.
pub fn should_continue(state: &BatchState) -> Step {
    if state.pending.is_empty() {
        Step::End
    } else {
        Step::Analyze
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub notes: Vec<PathBuf>,
    pub failures: usize,
}

/// The analyze/draft pipeline and everything it needs.
pub struct Pipeline {
    engine: AnalysisEngine,
    policy: PolicyProvider,
    composer: NoteComposer,
    notifier: Arc<dyn Notifier>,
    progress: Arc<dyn ProgressSink>,
    pacing: Pacing,
}

impl Pipeline {
    pub fn new(
        engine: AnalysisEngine,
        policy: PolicyProvider,
        composer: NoteComposer,
        notifier: Arc<dyn Notifier>,
        progress: Arc<dyn ProgressSink>,
        pacing: Pacing,
    ) -> Self {
        debug!(
            "Pipeline ready: model={}, policy={}, notes={}, pacing={}",
            engine.model_name(),
            policy.path().display(),
            composer.output_dir().display(),
            pacing.is_enabled()
        );
        Self {
            engine,
            policy,
            composer,
            notifier,
            progress,
            pacing,
        }
    }

    pub fn composer(&self) -> &NoteComposer {
        &self.composer
    }

    /// Analyze one report against the hospital policy. Never fails.
    pub async fn analyze(&self, report: &Report) -> Analysis {
        self.progress.emit(
            &format!(
                ">> Processing Case: {} - {}",
                report.patient_name, report.test_name
            ),
            Style::Heading,
        );
        self.pacing.pause(500).await;

        let policy_text = self.policy.load();

        self.progress.emit("DEBUG: Engaging Neural Engine...", Style::Dim);
        self.pacing.pause(800).await;
        self.progress.emit(
            "search_tool: Querying 'UpToDate' Clinical Guidelines...",
            Style::Step,
        );
        self.pacing.pause(600).await;
        self.progress.emit(
            "context_retriever: Fetching Hospital Protocols v2024.2...",
            Style::Step,
        );
        self.pacing.pause(600).await;
        self.progress.emit(
            "reasoning_engine: Cross-referencing patient history...",
            Style::Step,
        );
        self.pacing.pause(800).await;

        self.progress.begin_wait(&format!(
            "🧠 Consulting {} against hospital policy...",
            self.engine.model_name()
        ));
        let analysis = self.engine.analyze(report, &policy_text).await;
        self.progress.end_wait();

        if analysis.is_failure() {
            self.progress
                .emit(&format!("⚠️  Analysis degraded: {}", analysis.analogy), Style::Error);
        } else {
            self.progress.emit("✅ Analysis Complete", Style::Success);
        }
        let preview: String = analysis.summary.chars().take(50).collect();
        self.progress
            .emit(&format!("Detected: {}...", preview), Style::Plain);

        analysis
    }

    /// Escalate if required, then render and save the note.
    pub async fn draft(&self, report: &Report, analysis: &Analysis) -> Result<Drafted, PipelineError> {
        if requires_alert(analysis) {
            self.notifier.escalate(report, analysis).await;
        }

        let note = self.composer.compose(report, analysis);
        let path = self
            .composer
            .persist(&note)
            .map_err(|source| PipelineError::Persist {
                patient: report.patient_name.clone(),
                source,
            })?;

        info!(
            "Drafted {} note for {} at {}",
            note.test_name,
            report.id,
            path.display()
        );
        Ok(Drafted { note, path })
    }

    /// Run the fetch → analyze → draft loop until no pending reports remain.
    pub async fn run_batch(&self, store: &mut ReportStore) -> BatchSummary {
        let mut state = BatchState::default();
        let mut summary = BatchSummary::default();
        let mut step = Step::Fetch;

        loop {
            debug!("Batch step: {:?}", step);
            step = match step {
                Step::Fetch => {
                    self.fetch(store, &mut state);
                    should_continue(&state)
                }
                Step::Analyze => {
                    if let Some(report) = state.pending.front().cloned() {
                        self.progress.emit(
                            &format!("\n🔬 Case {}", state.processed_count + 1),
                            Style::Heading,
                        );
                        let analysis = self.analyze(&report).await;
                        state.current = Some((report, analysis));
                    }
                    Step::Draft
                }
                Step::Draft => {
                    if let Some((report, analysis)) = state.current.take() {
                        match self.draft(&report, &analysis).await {
                            Ok(drafted) => {
                                self.progress.emit(
                                    &format!("📄 FILE GENERATED: {}", drafted.path.display()),
                                    Style::Success,
                                );
                                self.progress.emit(&drafted.note.content, Style::Plain);
                                summary.notes.push(drafted.path);
                            }
                            Err(e) => {
                                error!("{}", e);
                                self.progress.emit(&format!("❌ {}", e), Style::Error);
                                summary.failures += 1;
                            }
                        }

                        store.mark_processed(&report.id, &analysis);
                        state.pending.pop_front();
                        state.processed_count += 1;
                    }
                    should_continue(&state)
                }
                Step::End => break,
            };
        }

        summary.processed = state.processed_count;
        summary
    }

    fn fetch(&self, store: &ReportStore, state: &mut BatchState) {
        self.progress.emit(
            "📥 STEP 1: CONNECTION INITIALIZED - Scanning hospital database...",
            Style::Heading,
        );

        state.pending = store.fetch_pending().into();
        state.processed_count = 0;

        self.progress.emit(
            &format!("   Incoming Queue ({} Reports found)", state.pending.len()),
            Style::Plain,
        );
        for report in &state.pending {
            self.progress.emit(
                &format!(
                    "     {:<16} {:<20} {}",
                    report.patient_name, report.test_name, report.status
                ),
                Style::Plain,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::models::{ReportStatus, RiskLevel};
    use crate::note::alert::testing::CountingNotifier;
    use crate::pipeline::progress::testing::RecordingSink;
    use tempfile::TempDir;

    const URGENT_REPLY: &str = r#"```json
{"findings": ["Creatinine 2.1 vs 0.9"], "risk_level": "Urgent", "policy_level": "Level 4",
 "summary": "Creatinine has more than doubled; acute kidney injury suspected.",
 "policy_citation": "Creatinine increase > 100% from baseline", "analogy": "Clogged filters."}
```"#;

    const LEVEL5_REPLY: &str = r#"{"findings": [], "risk_level": "Critical", "policy_level": "Level 5",
 "summary": "Critical anemia.", "policy_citation": "Hemoglobin < 5 g/dL", "analogy": "Empty tank."}"#;

    struct Harness {
        pipeline: Pipeline,
        notifier: Arc<CountingNotifier>,
        sink: Arc<RecordingSink>,
        model: Arc<ScriptedModel>,
        _dir: TempDir,
    }

    fn harness(model: Arc<ScriptedModel>) -> Harness {
        let dir = TempDir::new().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(
            AnalysisEngine::new(model.clone()),
            PolicyProvider::new(dir.path().join("missing_policy.txt")),
            NoteComposer::new(dir.path().join("notes")),
            notifier.clone(),
            sink.clone(),
            Pacing::disabled(),
        );
        Harness {
            pipeline,
            notifier,
            sink,
            model,
            _dir: dir,
        }
    }

    #[test]
    fn test_should_continue() {
        let mut state = BatchState::default();
        assert_eq!(should_continue(&state), Step::End);

        state.pending.push_back(ReportStore::seeded().reports()[0].clone());
        assert_eq!(should_continue(&state), Step::Analyze);
    }

    #[tokio::test]
    async fn test_batch_processes_every_pending_report_once() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let mut store = ReportStore::seeded();

        let summary = h.pipeline.run_batch(&mut store).await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.notes.len(), 3);
        assert_eq!(summary.failures, 0);
        assert_eq!(h.model.calls(), 3);
        assert!(store.fetch_pending().is_empty());
        assert!(store
            .reports()
            .iter()
            .all(|r| r.status == ReportStatus::Processed && r.ai_analysis.is_some()));
    }

    #[tokio::test]
    async fn test_batch_with_nothing_pending_ends_immediately() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let mut store = ReportStore::seeded();
        h.pipeline.run_batch(&mut store).await;

        let summary = h.pipeline.run_batch(&mut store).await;

        assert_eq!(summary.processed, 0);
        assert_eq!(h.model.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_survives_model_failure() {
        let h = harness(ScriptedModel::failing());
        let mut store = ReportStore::seeded();

        let summary = h.pipeline.run_batch(&mut store).await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.notes.len(), 3);
        for path in &summary.notes {
            let content = std::fs::read_to_string(path).unwrap();
            assert!(content.contains("AI Failed to generate valid JSON."));
            assert!(content.contains("ROUTINE - Error"));
        }
    }

    #[tokio::test]
    async fn test_batch_removes_report_even_when_save_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let pipeline = Pipeline::new(
            AnalysisEngine::new(ScriptedModel::replying(URGENT_REPLY)),
            PolicyProvider::new(dir.path().join("policy.txt")),
            NoteComposer::new(&blocker),
            Arc::new(CountingNotifier::default()),
            Arc::new(RecordingSink::default()),
            Pacing::disabled(),
        );
        let mut store = ReportStore::seeded();

        let summary = pipeline.run_batch(&mut store).await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failures, 3);
        assert!(summary.notes.is_empty());
        assert!(store.fetch_pending().is_empty());
    }

    #[tokio::test]
    async fn test_kidney_report_end_to_end() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let store = ReportStore::seeded();
        let report = store.get("kidney-func-02").unwrap();

        let analysis = h.pipeline.analyze(report).await;
        let drafted = h.pipeline.draft(report, &analysis).await.unwrap();

        assert!(drafted.note.content.contains("David Chen"));
        assert!(drafted.note.content.contains("Renal Function"));
        let risk_line = drafted
            .note
            .content
            .lines()
            .skip_while(|l| !l.starts_with("RISK ASSESSMENT:"))
            .nth(1)
            .unwrap();
        assert_eq!(risk_line, "URGENT - Level 4");
        assert!(drafted.path.exists());
        assert_eq!(analysis.risk_level, RiskLevel::Urgent);
    }

    #[tokio::test]
    async fn test_level5_triggers_escalation() {
        let h = harness(ScriptedModel::replying(LEVEL5_REPLY));
        let mut store = ReportStore::seeded();

        h.pipeline.run_batch(&mut store).await;

        assert_eq!(
            h.notifier.escalated(),
            vec!["blood-test-1", "kidney-func-02", "usg-pelvis-01"]
        );
    }

    #[tokio::test]
    async fn test_non_level5_does_not_escalate() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let mut store = ReportStore::seeded();

        h.pipeline.run_batch(&mut store).await;

        assert!(h.notifier.escalated().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_narrates_progress() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let report = ReportStore::seeded().get("usg-pelvis-01").cloned().unwrap();

        h.pipeline.analyze(&report).await;

        assert!(h.sink.contains(">> Processing Case: Mia Hernandez - Ultrasound Pelvis"));
        assert!(h.sink.contains("Engaging Neural Engine"));
        assert!(h.sink.contains("search_tool"));
        assert!(h.sink.contains("✅ Analysis Complete"));
        assert!(h.sink.contains("Detected: Creatinine has more than doubled; acute kidney inj..."));
    }

    #[tokio::test]
    async fn test_policy_fallback_reaches_model() {
        let h = harness(ScriptedModel::replying(URGENT_REPLY));
        let report = ReportStore::seeded().reports()[0].clone();

        h.pipeline.analyze(&report).await;

        let sent = h.model.last_messages();
        assert!(sent[1].content.contains(crate::policy::FALLBACK_POLICY));
    }
}
