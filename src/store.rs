//! In-memory report store.
//!
//! Holds the seeded lab reports and their mutable processing status.
//! A single owner mutates the store; the HTTP service wraps it in a mutex.

use crate::models::{AiAnalysis, Analysis, RawData, Report, ReportStatus};
use serde_json::json;
use tracing::debug;

/// Mutable collection of reports, populated once from seed data.
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: Vec<Report>,
    initialized: bool,
}

impl ReportStore {
    /// Create an empty, uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that is already populated with the seed reports.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store.ensure_initialized();
        store
    }

    /// Copy the seed records into the store. Only the first call has an effect.
    pub fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }

        self.reports.extend(seed_reports());
        self.initialized = true;
        debug!("Report store initialized with {} reports", self.reports.len());
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// All reports, in store order.
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Look up a report by id.
    pub fn get(&self, id: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// Reports whose status is Pending or In-progress, in store order.
    pub fn fetch_pending(&self) -> Vec<Report> {
        self.reports
            .iter()
            .filter(|r| r.status.is_pending())
            .cloned()
            .collect()
    }

    /// Mark a report as processed and attach its analysis.
    ///
    /// Returns the updated report, or `None` if the id is unknown.
    pub fn mark_processed(&mut self, id: &str, analysis: &Analysis) -> Option<&Report> {
        let report = self.reports.iter_mut().find(|r| r.id == id)?;
        report.status = ReportStatus::Processed;
        report.ai_analysis = Some(AiAnalysis::from(analysis));
        Some(report)
    }
}

/// The static demonstration data set.
pub fn seed_reports() -> Vec<Report> {
    vec![
        Report {
            id: "blood-test-1".to_string(),
            patient_name: "Priya Sharma".to_string(),
            age: 47,
            test_name: "Blood Count (CBC)".to_string(),
            status: ReportStatus::InProgress,
            raw_data: RawData::structured(json!({
                "Hemoglobin": 4.5,
                "WBC": 14200,
                "Platelets": 150000
            })),
            history: Some(RawData::structured(json!({"WBC": 6000}))),
            ai_analysis: None,
        },
        Report {
            id: "kidney-func-02".to_string(),
            patient_name: "David Chen".to_string(),
            age: 62,
            test_name: "Renal Function".to_string(),
            status: ReportStatus::Pending,
            raw_data: RawData::structured(json!({
                "Creatinine": 2.1,
                "eGFR": 2000,
                "WBC": 2000
            })),
            history: Some(RawData::structured(json!({"Creatinine": 0.9}))),
            ai_analysis: None,
        },
        Report {
            id: "usg-pelvis-01".to_string(),
            patient_name: "Mia Hernandez".to_string(),
            age: 34,
            test_name: "Ultrasound Pelvis".to_string(),
            status: ReportStatus::Pending,
            raw_data: RawData::narrative(
                "No significant abnormalities. Ovaries normal size. Endometrium 4mm.",
            ),
            history: Some(RawData::narrative("Normal")),
            ai_analysis: None,
        },
    ]
}
