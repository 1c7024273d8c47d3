//! SQLite assessment ledger.
//!
//! RULE: Only store.rs talks to the database. The engine never persists;
//! the runner records finished assessments here.

use anyhow::Result;
use hta_core::engine::DossierAssessment;
use rusqlite::{params, Connection};

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRow {
    pub assessment_id:    String,
    pub recorded_at:      String,
    pub dossier_id:       String,
    pub framework_id:     String,
    pub rule_set_version: String,
    pub seed:             Option<u64>,
    pub overall_status:   String,
    pub compliance_score: f64,
    pub payload:          String,
}

pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_audit.sql"))?;
        Ok(())
    }

    /// Append one assessment; returns the generated assessment id.
    pub fn record(&self, assessment: &DossierAssessment) -> Result<String> {
        let assessment_id = uuid::Uuid::new_v4().to_string();
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let seed = assessment.probabilistic.as_ref().map(|p| p.seed as i64);
        self.conn.execute(
            "INSERT INTO assessment
                 (assessment_id, recorded_at, dossier_id, framework_id, rule_set_version,
                  seed, overall_status, compliance_score, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                assessment_id,
                recorded_at,
                assessment.dossier_id,
                assessment.framework_id.as_str(),
                assessment.rule_set_version,
                seed,
                assessment.compliance.overall_status.name(),
                assessment.compliance.compliance_score,
                serde_json::to_string(assessment)?,
            ],
        )?;
        log::debug!("recorded assessment {assessment_id} for {}", assessment.dossier_id);
        Ok(assessment_id)
    }

    /// Every recorded assessment of a dossier, oldest first.
    pub fn history(&self, dossier_id: &str) -> Result<Vec<AssessmentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT assessment_id, recorded_at, dossier_id, framework_id, rule_set_version,
                    seed, overall_status, compliance_score, payload
             FROM assessment WHERE dossier_id = ?1
             ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![dossier_id], |row| {
                Ok(AssessmentRow {
                    assessment_id:    row.get(0)?,
                    recorded_at:      row.get(1)?,
                    dossier_id:       row.get(2)?,
                    framework_id:     row.get(3)?,
                    rule_set_version: row.get(4)?,
                    seed:             row.get::<_, Option<i64>>(5)?.map(|s| s as u64),
                    overall_status:   row.get(6)?,
                    compliance_score: row.get(7)?,
                    payload:          row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM assessment", [], |row| row.get(0))?)
    }
}
