//! Patient registry.
//!
//! Patients carry an optional assigned doctor. The doctor side of that relationship is
//! derived by query (see [`crate::users::UserService::doctor_profile`]), so reassigning or
//! deleting a patient only ever writes the patient row, and deletion cascades to the
//! patient's appointments inside the same transaction.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::UnknownVariant;
use crate::store::{escape_like, id_column, json_column, opt_id_column, tag_column, Store};
use crate::users::require_doctor;
use crate::validation::{optional_text, parse_id, required_email, required_text};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use curamind_uuid::RecordId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

const PATIENT_COLUMNS: &str = "id, name, age, gender, email, phone, street, city, state, postal_code, assigned_doctor, medical_history, created_at, updated_at";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(UnknownVariant {
                kind: "gender",
                value: s.to_string(),
            }),
        }
    }
}

/// Postal address. All four parts are required together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Medication {
    pub medicine: String,
    pub dosage: String,
    pub duration: String,
}

/// One dated entry of a patient's medical history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub diagnosis: String,
    #[serde(default)]
    pub medications: Vec<Medication>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: RecordId,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub address: Address,
    #[schema(value_type = Option<String>)]
    pub assigned_doctor: Option<RecordId>,
    pub medical_history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// Body of a patient creation request.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    pub assigned_doctor: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<HistoryEntry>,
}

/// Partial update of a patient.
///
/// `assignedDoctor` distinguishes "absent" (keep) from `null` (unassign).
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    #[serde(default, deserialize_with = "present_or_null")]
    #[schema(value_type = Option<String>)]
    pub assigned_doctor: Option<Option<String>>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PatientQuery {
    /// Case-insensitive substring of the name or email.
    pub search: Option<String>,
    pub assigned_doctor: Option<String>,
    pub city: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PatientPage {
    pub patients: Vec<Patient>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

fn validate_age(age: Option<i64>) -> CoreResult<u32> {
    let age = age.ok_or_else(|| CoreError::validation("age is required"))?;
    u32::try_from(age).map_err(|_| CoreError::validation("age must be a non-negative integer"))
}

fn validate_gender(gender: Option<String>) -> CoreResult<Gender> {
    let raw = required_text("gender", gender)?;
    raw.as_str()
        .parse()
        .map_err(|_| CoreError::validation("gender must be one of male, female, other"))
}

fn validate_address(address: Option<AddressInput>) -> CoreResult<Address> {
    let address = address.ok_or_else(|| CoreError::validation("address is required"))?;
    Ok(Address {
        street: required_text("address.street", address.street)?.into_inner(),
        city: required_text("address.city", address.city)?.into_inner(),
        state: required_text("address.state", address.state)?.into_inner(),
        postal_code: required_text("address.postalCode", address.postal_code)?.into_inner(),
    })
}

fn validate_history_entry(entry: &HistoryEntry) -> CoreResult<()> {
    if entry.diagnosis.trim().is_empty() {
        return Err(CoreError::validation("medicalHistory.diagnosis is required"));
    }
    Ok(())
}

fn map_patient(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: tag_column(row, 3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: Address {
            street: row.get(6)?,
            city: row.get(7)?,
            state: row.get(8)?,
            postal_code: row.get(9)?,
        },
        assigned_doctor: opt_id_column(row, 10)?,
        medical_history: json_column(row, 11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn load_patient(conn: &Connection, id: RecordId) -> CoreResult<Patient> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id.to_string()],
        map_patient,
    )
    .optional()?
    .ok_or(CoreError::NotFound("Patient"))
}

/// Fails with `Patient not found` unless `id` names a patient.
pub(crate) fn require_patient(conn: &Connection, id: RecordId) -> CoreResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    exists.map(|_| ()).ok_or(CoreError::NotFound("Patient"))
}

fn email_taken(conn: &Connection, email: &str, except: Option<RecordId>) -> CoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM patients WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (found, except) {
        (None, _) => false,
        (Some(id), Some(except)) => id != except.to_string(),
        (Some(_), None) => true,
    })
}

fn duplicate_email() -> CoreError {
    CoreError::Conflict("A patient with this email already exists".into())
}

fn insert_patient(conn: &Connection, p: &Patient) -> CoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO patients ({PATIENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            p.id.to_string(),
            p.name,
            p.age,
            p.gender.as_str(),
            p.email,
            p.phone,
            p.address.street,
            p.address.city,
            p.address.state,
            p.address.postal_code,
            p.assigned_doctor.map(|id| id.to_string()),
            serde_json::to_string(&p.medical_history)?,
            p.created_at,
            p.updated_at,
        ],
    )?;
    Ok(())
}

fn write_patient(conn: &Connection, p: &Patient) -> CoreResult<()> {
    conn.execute(
        "UPDATE patients SET name = ?1, age = ?2, gender = ?3, email = ?4, phone = ?5,
             street = ?6, city = ?7, state = ?8, postal_code = ?9, assigned_doctor = ?10,
             medical_history = ?11, updated_at = ?12
         WHERE id = ?13",
        params![
            p.name,
            p.age,
            p.gender.as_str(),
            p.email,
            p.phone,
            p.address.street,
            p.address.city,
            p.address.state,
            p.address.postal_code,
            p.assigned_doctor.map(|id| id.to_string()),
            serde_json::to_string(&p.medical_history)?,
            p.updated_at,
            p.id.to_string(),
        ],
    )?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct PatientService {
    store: Store,
}

impl PatientService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Registers a new patient.
    ///
    /// # Errors
    ///
    /// - `Validation` naming the first missing or malformed field
    /// - `NotFound("Doctor")` if `assignedDoctor` does not name a doctor (nothing is stored)
    /// - `Conflict` if another patient already uses the email
    pub fn create(&self, input: NewPatient) -> CoreResult<Patient> {
        let name = required_text("name", input.name)?;
        let phone = required_text("phone", input.phone)?;
        let email = required_email("email", input.email)?;
        let address = validate_address(input.address)?;
        let age = validate_age(input.age)?;
        let gender = validate_gender(input.gender)?;
        let assigned_doctor = optional_text(input.assigned_doctor)
            .map(|raw| parse_id("assignedDoctor", &raw))
            .transpose()?;
        for entry in &input.medical_history {
            validate_history_entry(entry)?;
        }

        let now = Utc::now();
        let patient = Patient {
            id: RecordId::new(),
            name: name.into_inner(),
            age,
            gender,
            email: email.as_str().to_string(),
            phone: phone.into_inner(),
            address,
            assigned_doctor,
            medical_history: input.medical_history,
            created_at: now,
            updated_at: now,
        };

        let result = self.store.with_tx(|tx| {
            if let Some(doctor_id) = patient.assigned_doctor {
                require_doctor(tx, doctor_id)?;
            }
            if email_taken(tx, &patient.email, None)? {
                return Err(duplicate_email());
            }
            insert_patient(tx, &patient)
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    patient_id = %patient.id,
                    assigned_doctor = ?patient.assigned_doctor.map(|d| d.to_string()),
                    "registered patient"
                );
                Ok(patient)
            }
            Err(e) if e.is_constraint_violation() => Err(duplicate_email()),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: RecordId) -> CoreResult<Patient> {
        self.store.with_conn(|conn| load_patient(conn, id))
    }

    /// Applies a partial update, including doctor reassignment, as one transaction.
    pub fn update(&self, id: RecordId, patch: PatientPatch) -> CoreResult<Patient> {
        let result = self.store.with_tx(|tx| {
            let mut patient = load_patient(tx, id)?;

            if let Some(name) = patch.name {
                patient.name = required_text("name", Some(name))?.into_inner();
            }
            if let Some(phone) = patch.phone {
                patient.phone = required_text("phone", Some(phone))?.into_inner();
            }
            if let Some(email) = patch.email {
                let email = required_email("email", Some(email))?;
                if email_taken(tx, email.as_str(), Some(id))? {
                    return Err(duplicate_email());
                }
                patient.email = email.as_str().to_string();
            }
            if patch.address.is_some() {
                patient.address = validate_address(patch.address)?;
            }
            if patch.age.is_some() {
                patient.age = validate_age(patch.age)?;
            }
            if patch.gender.is_some() {
                patient.gender = validate_gender(patch.gender)?;
            }
            if let Some(assignment) = patch.assigned_doctor {
                let new_doctor = optional_text(assignment)
                    .map(|raw| parse_id("assignedDoctor", &raw))
                    .transpose()?;
                if let Some(doctor_id) = new_doctor {
                    require_doctor(tx, doctor_id)?;
                }
                if new_doctor != patient.assigned_doctor {
                    tracing::info!(
                        patient_id = %id,
                        from = ?patient.assigned_doctor.map(|d| d.to_string()),
                        to = ?new_doctor.map(|d| d.to_string()),
                        "reassigning patient"
                    );
                }
                patient.assigned_doctor = new_doctor;
            }

            patient.updated_at = Utc::now();
            write_patient(tx, &patient)?;
            Ok(patient)
        });

        match result {
            Err(e) if e.is_constraint_violation() => Err(duplicate_email()),
            other => other,
        }
    }

    /// Deletes a patient together with every appointment referencing them.
    ///
    /// Returns the number of appointments removed.
    pub fn delete(&self, id: RecordId) -> CoreResult<usize> {
        let removed = self.store.with_tx(|tx| {
            require_patient(tx, id)?;
            let removed = tx.execute(
                "DELETE FROM appointments WHERE patient_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
            Ok(removed)
        })?;

        tracing::info!(patient_id = %id, appointments_removed = removed, "deleted patient");
        Ok(removed)
    }

    /// Lists patients matching `query`, newest first, one page at a time.
    pub fn list(&self, query: PatientQuery) -> CoreResult<PatientPage> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(CoreError::validation("page must be at least 1"));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(term) = optional_text(query.search) {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            clauses.push(
                "(unicode_lower(name) LIKE ? ESCAPE '\\' OR unicode_lower(email) LIKE ? ESCAPE '\\')",
            );
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
        if let Some(raw) = optional_text(query.assigned_doctor) {
            let doctor_id = parse_id("assignedDoctor", &raw)?;
            clauses.push("assigned_doctor = ?");
            args.push(Value::Text(doctor_id.to_string()));
        }
        if let Some(city) = optional_text(query.city) {
            clauses.push("unicode_lower(city) = ?");
            args.push(Value::Text(city.to_lowercase()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        self.store.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM patients{where_sql}"),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            let mut page_args = args.clone();
            page_args.push(Value::Integer(i64::from(limit)));
            page_args.push(Value::Integer(i64::from(page - 1) * i64::from(limit)));

            let mut stmt = conn.prepare(&format!(
                "SELECT {PATIENT_COLUMNS} FROM patients{where_sql}
                 ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
            ))?;
            let patients = stmt
                .query_map(params_from_iter(page_args.iter()), map_patient)?
                .collect::<Result<Vec<_>, _>>()?;

            let total = u64::try_from(total).unwrap_or(0);
            let pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);

            Ok(PatientPage {
                patients,
                total,
                page,
                limit,
                pages,
            })
        })
    }

    /// Appends an entry to the patient's medical history.
    pub fn add_history_entry(&self, id: RecordId, entry: HistoryEntry) -> CoreResult<Patient> {
        validate_history_entry(&entry)?;
        self.store.with_tx(|tx| {
            let mut patient = load_patient(tx, id)?;
            patient.medical_history.push(entry);
            patient.updated_at = Utc::now();
            write_patient(tx, &patient)?;
            Ok(patient)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{AppointmentService, NewAppointment};
    use crate::test_support::{create_doctor, create_patient, memory_store, new_patient};
    use crate::users::UserService;

    fn count_patients(store: &Store) -> i64 {
        store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?)
            })
            .unwrap()
    }

    #[test]
    fn test_create_with_assigned_doctor() {
        let store = memory_store();
        let doctor = create_doctor(&store, "grey@h.org");
        let service = PatientService::new(store.clone());

        let patient = service
            .create(new_patient("John@Doe.com", Some(doctor.id)))
            .expect("create should succeed");

        assert_eq!(patient.email, "john@doe.com");
        assert_eq!(patient.assigned_doctor, Some(doctor.id));
        assert_eq!(service.get(patient.id).unwrap(), patient);

        let profile = UserService::new(store).doctor_profile(doctor.id).unwrap();
        assert_eq!(profile.patients, vec![patient.id]);
    }

    #[test]
    fn test_create_with_unknown_doctor_persists_nothing() {
        let store = memory_store();
        let service = PatientService::new(store.clone());

        let err = service
            .create(new_patient("john@doe.com", Some(RecordId::new())))
            .expect_err("unknown doctor should be rejected");

        assert!(matches!(err, CoreError::NotFound("Doctor")));
        assert_eq!(count_patients(&store), 0);
    }

    #[test]
    fn test_create_rejects_non_doctor_account_as_doctor() {
        let store = memory_store();
        let admin = UserService::new(store.clone())
            .create(crate::Role::Admin, crate::test_support::new_doctor("a@h.org"))
            .unwrap();

        let err = PatientService::new(store)
            .create(new_patient("john@doe.com", Some(admin.id)))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("Doctor")));
    }

    #[test]
    fn test_create_reports_missing_fields_by_name() {
        let service = PatientService::new(memory_store());

        let cases: Vec<(Box<dyn Fn(&mut NewPatient)>, &str)> = vec![
            (Box::new(|p| p.name = None), "name is required"),
            (Box::new(|p| p.phone = Some(" ".into())), "phone is required"),
            (Box::new(|p| p.email = None), "email is required"),
            (Box::new(|p| p.address = None), "address is required"),
            (
                Box::new(|p| {
                    if let Some(a) = p.address.as_mut() {
                        a.city = None;
                    }
                }),
                "address.city is required",
            ),
            (Box::new(|p| p.age = None), "age is required"),
            (Box::new(|p| p.age = Some(-1)), "age must be a non-negative integer"),
            (Box::new(|p| p.gender = None), "gender is required"),
            (
                Box::new(|p| p.gender = Some("robot".into())),
                "gender must be one of male, female, other",
            ),
        ];

        for (mutate, expected) in cases {
            let mut input = new_patient("john@doe.com", None);
            mutate(&mut input);
            match service.create(input) {
                Err(CoreError::Validation(m)) => assert_eq!(m, expected),
                other => panic!("expected '{expected}', got {other:?}"),
            }
        }
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let store = memory_store();
        create_patient(&store, "john@doe.com", None);

        let err = PatientService::new(store)
            .create(new_patient("JOHN@doe.com", None))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_reassign_and_back_restores_doctor_lists() {
        let store = memory_store();
        let users = UserService::new(store.clone());
        let service = PatientService::new(store.clone());
        let a = create_doctor(&store, "a@h.org");
        let b = create_doctor(&store, "b@h.org");
        let p1 = create_patient(&store, "p1@x.org", Some(a.id));
        let p2 = create_patient(&store, "p2@x.org", Some(b.id));

        let before_a = users.doctor_profile(a.id).unwrap().patients;
        let before_b = users.doctor_profile(b.id).unwrap().patients;

        service
            .update(
                p1.id,
                PatientPatch {
                    assigned_doctor: Some(Some(b.id.to_string())),
                    ..Default::default()
                },
            )
            .expect("reassign to B");
        assert!(users.doctor_profile(a.id).unwrap().patients.is_empty());
        let mid_b = users.doctor_profile(b.id).unwrap().patients;
        assert!(mid_b.contains(&p1.id) && mid_b.contains(&p2.id));

        service
            .update(
                p1.id,
                PatientPatch {
                    assigned_doctor: Some(Some(a.id.to_string())),
                    ..Default::default()
                },
            )
            .expect("reassign back to A");

        assert_eq!(users.doctor_profile(a.id).unwrap().patients, before_a);
        assert_eq!(users.doctor_profile(b.id).unwrap().patients, before_b);
    }

    #[test]
    fn test_failed_reassignment_changes_nothing() {
        let store = memory_store();
        let a = create_doctor(&store, "a@h.org");
        let patient = create_patient(&store, "p@x.org", Some(a.id));
        let service = PatientService::new(store);

        let err = service
            .update(
                patient.id,
                PatientPatch {
                    name: Some("Renamed".into()),
                    assigned_doctor: Some(Some(RecordId::new().to_string())),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("Doctor")));

        let unchanged = service.get(patient.id).unwrap();
        assert_eq!(unchanged.name, "John Doe");
        assert_eq!(unchanged.assigned_doctor, Some(a.id));
    }

    #[test]
    fn test_patch_null_unassigns_and_absent_keeps() {
        let store = memory_store();
        let a = create_doctor(&store, "a@h.org");
        let patient = create_patient(&store, "p@x.org", Some(a.id));
        let service = PatientService::new(store);

        let kept: PatientPatch = serde_json::from_str(r#"{"age": 43}"#).unwrap();
        let updated = service.update(patient.id, kept).unwrap();
        assert_eq!(updated.age, 43);
        assert_eq!(updated.assigned_doctor, Some(a.id));

        let cleared: PatientPatch = serde_json::from_str(r#"{"assignedDoctor": null}"#).unwrap();
        let updated = service.update(patient.id, cleared).unwrap();
        assert_eq!(updated.assigned_doctor, None);
    }

    #[test]
    fn test_delete_cascades_to_appointments_and_doctor_list() {
        let store = memory_store();
        let doctor = create_doctor(&store, "a@h.org");
        let patient = create_patient(&store, "p@x.org", Some(doctor.id));
        let other = create_patient(&store, "q@x.org", Some(doctor.id));
        let appointments = AppointmentService::new(store.clone());

        for (p, date) in [(patient.id, "2024-06-01"), (patient.id, "2024-06-02"), (other.id, "2024-06-01")] {
            appointments
                .create(NewAppointment {
                    patient: Some(p.to_string()),
                    doctor: Some(doctor.id.to_string()),
                    date: Some(date.into()),
                    time: Some("09:00".into()),
                    reason: Some("Checkup".into()),
                    notes: None,
                })
                .expect("booking should succeed");
        }

        let removed = PatientService::new(store.clone())
            .delete(patient.id)
            .expect("delete should succeed");
        assert_eq!(removed, 2);

        let remaining = appointments.list(Default::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|a| a.patient != patient.id));

        let profile = UserService::new(store.clone()).doctor_profile(doctor.id).unwrap();
        assert_eq!(profile.patients, vec![other.id]);
        assert_eq!(profile.appointments.len(), 1);

        assert!(matches!(
            PatientService::new(store).get(patient.id),
            Err(CoreError::NotFound("Patient"))
        ));
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let store = memory_store();
        let doctor = create_doctor(&store, "a@h.org");
        let service = PatientService::new(store.clone());

        for i in 0..12 {
            let mut input = new_patient(&format!("patient{i}@x.org"), None);
            input.name = Some(format!("Patient {i}"));
            if i % 3 == 0 {
                input.assigned_doctor = Some(doctor.id.to_string());
            }
            if i == 5 {
                input.address.as_mut().unwrap().city = Some("Shelbyville".into());
            }
            service.create(input).unwrap();
        }

        let first = service.list(PatientQuery::default()).unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.patients.len(), 10);
        assert_eq!(first.pages, 2);

        let second = service
            .list(PatientQuery {
                page: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(second.patients.len(), 2);

        let by_doctor = service
            .list(PatientQuery {
                assigned_doctor: Some(doctor.id.to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_doctor.total, 4);

        let by_city = service
            .list(PatientQuery {
                city: Some("shelbyville".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_city.total, 1);
        assert_eq!(by_city.patients[0].name, "Patient 5");

        let by_search = service
            .list(PatientQuery {
                search: Some("PATIENT1".into()),
                ..Default::default()
            })
            .unwrap();
        // "patient1", "patient10", "patient11" match by name or email
        assert_eq!(by_search.total, 3);

        let wildcard = service
            .list(PatientQuery {
                search: Some("%".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(wildcard.total, 0);

        assert!(matches!(
            service.list(PatientQuery {
                page: Some(0),
                ..Default::default()
            }),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_search_and_city_fold_accented_text() {
        let store = memory_store();
        let service = PatientService::new(store.clone());

        let mut input = new_patient("elodie@x.org", None);
        input.name = Some("Élodie Durand".into());
        input.address.as_mut().unwrap().city = Some("Zürich".into());
        service.create(input).unwrap();
        create_patient(&store, "john@doe.com", None);

        let search = |term: &str| {
            service
                .list(PatientQuery {
                    search: Some(term.into()),
                    ..Default::default()
                })
                .unwrap()
                .total
        };
        assert_eq!(search("Élodie"), 1);
        assert_eq!(search("élodie"), 1);
        assert_eq!(search("ÉLODIE"), 1);
        assert_eq!(search("elodie durand"), 0);

        let in_city = |city: &str| {
            service
                .list(PatientQuery {
                    city: Some(city.into()),
                    ..Default::default()
                })
                .unwrap()
                .total
        };
        assert_eq!(in_city("ZÜRICH"), 1);
        assert_eq!(in_city("zürich"), 1);
        assert_eq!(in_city("Zurich"), 0);
    }

    #[test]
    fn test_add_history_entry_appends() {
        let store = memory_store();
        let patient = create_patient(&store, "p@x.org", None);
        let service = PatientService::new(store);

        let entry = HistoryEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            diagnosis: "Hypertension".into(),
            medications: vec![Medication {
                medicine: "Lisinopril".into(),
                dosage: "10mg".into(),
                duration: "30 days".into(),
            }],
        };
        let updated = service.add_history_entry(patient.id, entry.clone()).unwrap();
        assert_eq!(updated.medical_history, vec![entry]);
        assert_eq!(service.get(patient.id).unwrap().medical_history.len(), 1);

        let blank = HistoryEntry {
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            diagnosis: " ".into(),
            medications: vec![],
        };
        assert!(matches!(
            service.add_history_entry(patient.id, blank),
            Err(CoreError::Validation(_))
        ));
    }
}
