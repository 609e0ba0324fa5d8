//! Prescription records written by doctors.
//!
//! Only manually authored prescriptions exist. Rows go away with their patient or doctor
//! through `ON DELETE CASCADE`.

use crate::error::UnknownVariant;
use crate::patients::require_patient;
use crate::store::{id_column, tag_column, Store};
use crate::users::require_doctor;
use crate::validation::{required_id, required_text};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use curamind_uuid::RecordId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

const PRESCRIPTION_COLUMNS: &str = "id, patient_id, doctor_id, content, source, created_at, updated_at";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionSource {
    Manual,
}

impl PrescriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionSource::Manual => "manual",
        }
    }
}

impl FromStr for PrescriptionSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(PrescriptionSource::Manual),
            _ => Err(UnknownVariant {
                kind: "prescription source",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: RecordId,
    #[schema(value_type = String)]
    pub patient: RecordId,
    #[schema(value_type = String)]
    pub doctor: RecordId,
    pub content: String,
    pub source: PrescriptionSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct NewPrescription {
    pub patient: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct PrescriptionPatch {
    pub content: Option<String>,
}

fn map_prescription(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: id_column(row, 0)?,
        patient: id_column(row, 1)?,
        doctor: id_column(row, 2)?,
        content: row.get(3)?,
        source: tag_column(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn load_prescription(conn: &Connection, id: RecordId) -> CoreResult<Prescription> {
    conn.query_row(
        &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1"),
        params![id.to_string()],
        map_prescription,
    )
    .optional()?
    .ok_or(CoreError::NotFound("Prescription"))
}

#[derive(Clone, Debug)]
pub struct PrescriptionService {
    store: Store,
}

impl PrescriptionService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Stores a prescription written by `doctor` for the patient named in `input`.
    pub fn create_manual(&self, doctor: RecordId, input: NewPrescription) -> CoreResult<Prescription> {
        let patient = required_id("patient", input.patient)?;
        let content = required_text("content", input.content)?.into_inner();

        let now = Utc::now();
        let prescription = Prescription {
            id: RecordId::new(),
            patient,
            doctor,
            content,
            source: PrescriptionSource::Manual,
            created_at: now,
            updated_at: now,
        };

        self.store.with_tx(|tx| {
            require_doctor(tx, doctor)?;
            require_patient(tx, patient)?;
            tx.execute(
                &format!(
                    "INSERT INTO prescriptions ({PRESCRIPTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    prescription.id.to_string(),
                    patient.to_string(),
                    doctor.to_string(),
                    prescription.content,
                    prescription.source.as_str(),
                    prescription.created_at,
                    prescription.updated_at,
                ],
            )?;
            Ok(())
        })?;

        tracing::info!(
            prescription_id = %prescription.id,
            patient_id = %patient,
            doctor_id = %doctor,
            "stored prescription"
        );
        Ok(prescription)
    }

    /// Replaces the content. Only the authoring doctor may do so.
    pub fn update(
        &self,
        id: RecordId,
        doctor: RecordId,
        patch: PrescriptionPatch,
    ) -> CoreResult<Prescription> {
        let content = required_text("content", patch.content)?.into_inner();

        self.store.with_tx(|tx| {
            let mut prescription = load_prescription(tx, id)?;
            if prescription.doctor != doctor {
                return Err(CoreError::NotOwner("prescription"));
            }
            prescription.content = content;
            prescription.updated_at = Utc::now();
            tx.execute(
                "UPDATE prescriptions SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    prescription.content,
                    prescription.updated_at,
                    id.to_string()
                ],
            )?;
            Ok(prescription)
        })
    }

    /// All prescriptions of a patient, newest first.
    pub fn list_for_patient(&self, patient: RecordId) -> CoreResult<Vec<Prescription>> {
        self.store.with_conn(|conn| {
            require_patient(conn, patient)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
                 WHERE patient_id = ?1 ORDER BY created_at DESC, id"
            ))?;
            let prescriptions = stmt
                .query_map(params![patient.to_string()], map_prescription)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(prescriptions)
        })
    }
}
