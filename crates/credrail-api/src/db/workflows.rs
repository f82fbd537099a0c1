//! Workflow record persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `workflow_records`
//! table. `save` is a true upsert keyed on the subject key; phase flags are
//! merged monotonically (`old OR new`) so a stale write can never clear an
//! issued flag. `mark_phase_issued` is the conditional write backing the
//! (subject, phase) idempotency gate across processes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use credrail_core::{SessionId, SubjectKey};
use credrail_state::workflow::PhaseCompletion;
use credrail_state::{EnrollmentPhase, WorkflowRecord, WorkflowStatus};

/// Upsert a workflow record.
pub async fn save(pool: &PgPool, record: &WorkflowRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_records (subject_key, session_id, surname, othernames,
         email, phone, status,
         registration_issued, registration_issued_at, registration_credential_id,
         mobilization_issued, mobilization_issued_at, mobilization_credential_id,
         service_issued, service_issued_at, service_credential_id,
         discharge_issued, discharge_issued_at, discharge_credential_id,
         proof_data, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                 $16, $17, $18, $19, $20, $21, $22)
         ON CONFLICT (subject_key) DO UPDATE SET
            session_id = EXCLUDED.session_id,
            surname = COALESCE(EXCLUDED.surname, workflow_records.surname),
            othernames = COALESCE(EXCLUDED.othernames, workflow_records.othernames),
            email = COALESCE(EXCLUDED.email, workflow_records.email),
            phone = COALESCE(EXCLUDED.phone, workflow_records.phone),
            status = EXCLUDED.status,
            registration_issued =
                workflow_records.registration_issued OR EXCLUDED.registration_issued,
            registration_issued_at = COALESCE(
                workflow_records.registration_issued_at, EXCLUDED.registration_issued_at),
            registration_credential_id = COALESCE(
                workflow_records.registration_credential_id, EXCLUDED.registration_credential_id),
            mobilization_issued =
                workflow_records.mobilization_issued OR EXCLUDED.mobilization_issued,
            mobilization_issued_at = COALESCE(
                workflow_records.mobilization_issued_at, EXCLUDED.mobilization_issued_at),
            mobilization_credential_id = COALESCE(
                workflow_records.mobilization_credential_id, EXCLUDED.mobilization_credential_id),
            service_issued = workflow_records.service_issued OR EXCLUDED.service_issued,
            service_issued_at = COALESCE(
                workflow_records.service_issued_at, EXCLUDED.service_issued_at),
            service_credential_id = COALESCE(
                workflow_records.service_credential_id, EXCLUDED.service_credential_id),
            discharge_issued = workflow_records.discharge_issued OR EXCLUDED.discharge_issued,
            discharge_issued_at = COALESCE(
                workflow_records.discharge_issued_at, EXCLUDED.discharge_issued_at),
            discharge_credential_id = COALESCE(
                workflow_records.discharge_credential_id, EXCLUDED.discharge_credential_id),
            proof_data = workflow_records.proof_data || EXCLUDED.proof_data,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(record.subject_key.as_str())
    .bind(record.session_id.as_ref().map(|s| *s.as_uuid()))
    .bind(&record.surname)
    .bind(&record.othernames)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(status_str(record.status))
    .bind(record.registration.issued)
    .bind(record.registration.issued_at)
    .bind(&record.registration.credential_id)
    .bind(record.mobilization.issued)
    .bind(record.mobilization.issued_at)
    .bind(&record.mobilization.credential_id)
    .bind(record.service.issued)
    .bind(record.service.issued_at)
    .bind(&record.service.credential_id)
    .bind(record.discharge.issued)
    .bind(record.discharge.issued_at)
    .bind(&record.discharge.credential_id)
    .bind(&record.proof_data)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Conditionally mark a phase issued.
///
/// Returns `false` when the phase was already issued — the cross-process
/// form of the idempotency gate. The flag column only moves false → true.
pub async fn mark_phase_issued(
    pool: &PgPool,
    subject_key: &SubjectKey,
    phase: EnrollmentPhase,
    credential_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let (flag, at, cred) = phase_columns(phase);
    let sql = format!(
        "UPDATE workflow_records
         SET {flag} = TRUE, {at} = $2, {cred} = $3, updated_at = $2
         WHERE subject_key = $1 AND NOT {flag}"
    );
    let result = sqlx::query(&sql)
        .bind(subject_key.as_str())
        .bind(Utc::now())
        .bind(credential_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove the record stored under an obsolete (placeholder) subject key.
pub async fn delete_by_subject(pool: &PgPool, subject_key: &SubjectKey) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM workflow_records WHERE subject_key = $1")
        .bind(subject_key.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete all demo records. Maintenance operation only.
pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM workflow_records")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Load all workflow records for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<WorkflowRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        "SELECT subject_key, session_id, surname, othernames, email, phone, status,
         registration_issued, registration_issued_at, registration_credential_id,
         mobilization_issued, mobilization_issued_at, mobilization_credential_id,
         service_issued, service_issued_at, service_credential_id,
         discharge_issued, discharge_issued_at, discharge_credential_id,
         proof_data, created_at, updated_at
         FROM workflow_records ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(WorkflowRow::into_record).collect())
}

fn status_str(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Pending => "pending",
        WorkflowStatus::Registered => "registered",
        WorkflowStatus::Mobilized => "mobilized",
        WorkflowStatus::InService => "in_service",
        WorkflowStatus::Discharged => "discharged",
    }
}

fn parse_status(s: &str) -> WorkflowStatus {
    match s {
        "registered" => WorkflowStatus::Registered,
        "mobilized" => WorkflowStatus::Mobilized,
        "in_service" => WorkflowStatus::InService,
        "discharged" => WorkflowStatus::Discharged,
        _ => WorkflowStatus::Pending,
    }
}

fn phase_columns(phase: EnrollmentPhase) -> (&'static str, &'static str, &'static str) {
    match phase {
        EnrollmentPhase::Registration => (
            "registration_issued",
            "registration_issued_at",
            "registration_credential_id",
        ),
        EnrollmentPhase::Mobilization => (
            "mobilization_issued",
            "mobilization_issued_at",
            "mobilization_credential_id",
        ),
        EnrollmentPhase::Service => {
            ("service_issued", "service_issued_at", "service_credential_id")
        }
        EnrollmentPhase::Discharge => (
            "discharge_issued",
            "discharge_issued_at",
            "discharge_credential_id",
        ),
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct WorkflowRow {
    subject_key: String,
    session_id: Option<Uuid>,
    surname: Option<String>,
    othernames: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    status: String,
    registration_issued: bool,
    registration_issued_at: Option<DateTime<Utc>>,
    registration_credential_id: Option<String>,
    mobilization_issued: bool,
    mobilization_issued_at: Option<DateTime<Utc>>,
    mobilization_credential_id: Option<String>,
    service_issued: bool,
    service_issued_at: Option<DateTime<Utc>>,
    service_credential_id: Option<String>,
    discharge_issued: bool,
    discharge_issued_at: Option<DateTime<Utc>>,
    discharge_credential_id: Option<String>,
    proof_data: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn into_record(self) -> WorkflowRecord {
        WorkflowRecord {
            subject_key: SubjectKey::from_raw(self.subject_key),
            session_id: self.session_id.map(SessionId),
            surname: self.surname,
            othernames: self.othernames,
            email: self.email,
            phone: self.phone,
            status: parse_status(&self.status),
            registration: PhaseCompletion {
                issued: self.registration_issued,
                issued_at: self.registration_issued_at,
                credential_id: self.registration_credential_id,
            },
            mobilization: PhaseCompletion {
                issued: self.mobilization_issued,
                issued_at: self.mobilization_issued_at,
                credential_id: self.mobilization_credential_id,
            },
            service: PhaseCompletion {
                issued: self.service_issued,
                issued_at: self.service_issued_at,
                credential_id: self.service_credential_id,
            },
            discharge: PhaseCompletion {
                issued: self.discharge_issued,
                issued_at: self.discharge_issued_at,
                credential_id: self.discharge_credential_id,
            },
            proof_data: self.proof_data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
