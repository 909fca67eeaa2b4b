//! Clinical note rendering and persistence.
//!
//! Notes are fixed-width plain text files named
//! `Report_<Patient_Name>_<unix seconds>.txt`. Two notes for the same
//! patient within the same second share a filename; the later write wins.

use crate::models::{Analysis, Report};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

const BANNER: &str = "============================================================";
const DIVIDER: &str = "------------------------------------------------------------";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Environment variables that mark a hosted deployment with a read-only tree.
const CONSTRAINED_ENV_VARS: [&str; 2] = ["VERCEL", "RENDER"];

/// A rendered clinical note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub patient_name: String,
    pub test_name: String,
    pub created_at: DateTime<Local>,
    pub content: String,
}

impl Note {
    /// Filename under which this note is persisted.
    pub fn file_name(&self) -> String {
        note_file_name(&self.patient_name, self.created_at.timestamp())
    }
}

/// `Report_<Patient_Name>_<timestamp>.txt`
pub fn note_file_name(patient_name: &str, timestamp: i64) -> String {
    format!("Report_{}_{}.txt", patient_name.replace(' ', "_"), timestamp)
}

/// Whether the process runs in a hosted environment that only allows
/// writes to the temp directory.
pub fn constrained_environment() -> bool {
    CONSTRAINED_ENV_VARS
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Choose where notes are written.
pub fn select_output_dir(configured: &Path, constrained: bool) -> PathBuf {
    if constrained {
        std::env::temp_dir()
    } else {
        configured.to_path_buf()
    }
}

/// Renders and stores clinical notes.
#[derive(Debug, Clone)]
pub struct NoteComposer {
    output_dir: PathBuf,
}

impl NoteComposer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render a note stamped with the current wall-clock time.
    pub fn compose(&self, report: &Report, analysis: &Analysis) -> Note {
        compose_note(report, analysis, Local::now())
    }

    /// Render the minimal note served when a report has no note on disk yet.
    pub fn compose_placeholder(&self, report: &Report) -> Note {
        let created_at = Local::now();
        let (summary, risk) = match &report.ai_analysis {
            Some(ai) => (ai.summary.clone(), ai.risk_level.to_string()),
            None => ("No Data Available".to_string(), "Unknown".to_string()),
        };

        let mut content = String::new();
        content.push_str(BANNER);
        content.push_str("\nOFFICIAL HOSPITAL CLINICAL NOTE\n");
        content.push_str(BANNER);
        content.push('\n');
        content.push_str(&format!("PATIENT NAME:  {}\n", report.patient_name));
        content.push_str(&format!("TEST:          {}\n", report.test_name));
        content.push_str(&format!("DATE:          {}\n", created_at.format(DATE_FORMAT)));
        content.push_str(DIVIDER);
        content.push_str("\nRESULT:\n");
        content.push_str(&summary);
        content.push_str(&format!("\n\nRISK ASSESSMENT: {}\n", risk));
        content.push_str(BANNER);

        Note {
            patient_name: report.patient_name.clone(),
            test_name: report.test_name.clone(),
            created_at,
            content,
        }
    }

    /// Write a note to the output directory, creating it if needed.
    pub fn persist(&self, note: &Note) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                self.output_dir.display()
            )
        })?;

        let path = self.output_dir.join(note.file_name());
        std::fs::write(&path, &note.content)
            .with_context(|| format!("Failed to write note to {}", path.display()))?;

        debug!("Wrote note {}", path.display());
        Ok(path)
    }

    /// Most recently modified note for a patient, if any exist.
    pub fn latest_for(&self, patient_name: &str) -> Result<Option<PathBuf>> {
        if !self.output_dir.is_dir() {
            return Ok(None);
        }

        let prefix = format!("Report_{}_", patient_name.replace(' ', "_"));
        let mut latest: Option<(SystemTime, PathBuf)> = None;

        for entry in WalkDir::new(&self.output_dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| {
                format!("Failed to list notes in {}", self.output_dir.display())
            })?;

            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type().is_file() || !name.starts_with(&prefix) || !name.ends_with(".txt") {
                continue;
            }

            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            let newer = match &latest {
                Some((best_time, best_path)) => {
                    modified > *best_time
                        || (modified == *best_time && entry.path() > best_path.as_path())
                }
                None => true,
            };
            if newer {
                latest = Some((modified, entry.into_path()));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

/// Render a full clinical note at the given time.
pub fn compose_note(report: &Report, analysis: &Analysis, created_at: DateTime<Local>) -> Note {
    let risk = analysis.risk_level.to_string().to_uppercase();
    let mut content = String::new();

    content.push('\n');
    content.push_str(BANNER);
    content.push_str("\n              OFFICIAL HOSPITAL CLINICAL NOTE\n");
    content.push_str(BANNER);
    content.push('\n');

    content.push_str(&format!("PATIENT NAME:  {}\n", report.patient_name));
    content.push_str(&format!("INVESTIGATION: {}\n", report.test_name));
    content.push_str(&format!("DATE:          {}\n", created_at.format(DATE_FORMAT)));
    content.push_str(DIVIDER);
    content.push('\n');

    content.push_str("CLINICAL FINDINGS:\n");
    content.push_str(&analysis.summary);
    content.push('\n');
    for finding in &analysis.findings {
        content.push_str(&format!("  - {}\n", finding));
    }
    content.push('\n');

    content.push_str("RISK ASSESSMENT:\n");
    content.push_str(&format!("{} - {}\n\n", risk, analysis.policy_level));

    content.push_str("RECOMMENDED ACTION:\n");
    content.push_str(&format!("{} {} REVIEW\n", analysis.risk_level.icon(), risk));
    content.push_str(BANNER);
    content.push('\n');

    Note {
        patient_name: report.patient_name.clone(),
        test_name: report.test_name.clone(),
        created_at,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiAnalysis, RiskLevel};
    use crate::store::ReportStore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn report(id: &str) -> Report {
        ReportStore::seeded().get(id).cloned().unwrap()
    }

    fn analysis(risk: RiskLevel, level: &str) -> Analysis {
        Analysis {
            findings: vec!["Creatinine 2.1 mg/dL".to_string()],
            risk_level: risk,
            policy_level: level.to_string(),
            summary: "Creatinine has more than doubled since the last panel.".to_string(),
            policy_citation: "Creatinine rise > 100%: Level 4".to_string(),
            analogy: "The filters are clogged.".to_string(),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_compose_note_contents() {
        let note = compose_note(
            &report("kidney-func-02"),
            &analysis(RiskLevel::Urgent, "Level 4"),
            fixed_time(),
        );

        assert!(note.content.contains("OFFICIAL HOSPITAL CLINICAL NOTE"));
        assert!(note.content.contains("PATIENT NAME:  David Chen"));
        assert!(note.content.contains("INVESTIGATION: Renal Function"));
        assert!(note.content.contains("DATE:          2024-03-14 09:26:53"));
        assert!(note.content.contains("Creatinine has more than doubled"));
        assert!(note.content.contains("  - Creatinine 2.1 mg/dL"));
        assert!(note.content.contains("URGENT - Level 4"));
        assert!(note.content.contains("⚠️ URGENT REVIEW"));
    }

    #[test]
    fn test_recommended_action_icons() {
        let r = report("blood-test-1");
        let routine = compose_note(&r, &analysis(RiskLevel::Routine, "Level 1"), fixed_time());
        let critical = compose_note(&r, &analysis(RiskLevel::Critical, "Level 5"), fixed_time());

        assert!(routine.content.contains("✅ ROUTINE REVIEW"));
        assert!(critical.content.contains("🚨 CRITICAL REVIEW"));
        assert!(critical.content.contains("CRITICAL - Level 5"));
    }

    #[test]
    fn test_every_note_names_patient_test_and_risk() {
        for r in ReportStore::seeded().reports() {
            for risk in [RiskLevel::Routine, RiskLevel::Urgent, RiskLevel::Critical] {
                let note = compose_note(r, &analysis(risk, "Level 3"), fixed_time());
                assert!(note.content.contains(&r.patient_name));
                assert!(note.content.contains(&r.test_name));
                assert!(note.content.contains(&risk.to_string().to_uppercase()));
            }
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(note_file_name("Mia Hernandez", 1700000000), "Report_Mia_Hernandez_1700000000.txt");

        let note = compose_note(&report("kidney-func-02"), &analysis(RiskLevel::Urgent, "Level 4"), fixed_time());
        assert_eq!(note.file_name(), format!("Report_David_Chen_{}.txt", fixed_time().timestamp()));
    }

    #[test]
    fn test_select_output_dir() {
        let configured = Path::new("generated_reports");
        assert_eq!(select_output_dir(configured, false), PathBuf::from("generated_reports"));
        assert_eq!(select_output_dir(configured, true), std::env::temp_dir());
    }

    #[test]
    fn test_persist_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let composer = NoteComposer::new(temp_dir.path().join("nested").join("notes"));
        let note = composer.compose(&report("usg-pelvis-01"), &analysis(RiskLevel::Routine, "Level 1"));

        let path = composer.persist(&note).unwrap();

        assert!(path.starts_with(composer.output_dir()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), note.content);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("Report_Mia_Hernandez_"));
    }

    #[test]
    fn test_latest_for_picks_newest_matching_note() {
        let temp_dir = TempDir::new().unwrap();
        let composer = NoteComposer::new(temp_dir.path());
        let r = report("kidney-func-02");

        let older = compose_note(&r, &analysis(RiskLevel::Routine, "Level 1"), fixed_time());
        let newer = compose_note(
            &r,
            &analysis(RiskLevel::Urgent, "Level 4"),
            fixed_time() + chrono::Duration::seconds(5),
        );
        composer.persist(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let newer_path = composer.persist(&newer).unwrap();
        std::fs::write(temp_dir.path().join("Report_Priya_Sharma_1.txt"), "other").unwrap();

        assert_eq!(composer.latest_for("David Chen").unwrap(), Some(newer_path));
        assert_eq!(composer.latest_for("Mia Hernandez").unwrap(), None);
    }

    #[test]
    fn test_latest_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let composer = NoteComposer::new(temp_dir.path().join("absent"));
        assert_eq!(composer.latest_for("David Chen").unwrap(), None);
    }

    #[test]
    fn test_placeholder_note() {
        let composer = NoteComposer::new("unused");
        let mut r = report("blood-test-1");

        let note = composer.compose_placeholder(&r);
        assert!(note.content.contains("PATIENT NAME:  Priya Sharma"));
        assert!(note.content.contains("No Data Available"));
        assert!(note.content.contains("RISK ASSESSMENT: Unknown"));

        r.ai_analysis = Some(AiAnalysis::from(&analysis(RiskLevel::Critical, "Level 5")));
        let note = composer.compose_placeholder(&r);
        assert!(note.content.contains("Creatinine has more than doubled"));
        assert!(note.content.contains("RISK ASSESSMENT: Critical"));
    }
}
