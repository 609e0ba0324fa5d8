//! Appointment ledger.
//!
//! A patient may hold at most one non-cancelled appointment per calendar day. The check is
//! made inside the booking transaction and is backed by a partial unique index on
//! `(patient_id, date)`, so a concurrent double booking fails at commit instead of slipping
//! through.

use crate::error::UnknownVariant;
use crate::patients::require_patient;
use crate::store::{id_column, tag_column, Store};
use crate::users::require_doctor;
use crate::validation::{optional_text, parse_date, parse_id, parse_time, required_id, required_text};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use curamind_uuid::RecordId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

const APPOINTMENT_COLUMNS: &str =
    "id, doctor_id, patient_id, date, time, status, reason, notes, created_at, updated_at";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rescheduled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    /// Whether the appointment occupies the patient's day.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// Whether `self -> next` follows the nominal lifecycle.
    ///
    /// `pending -> confirmed -> completed`, with `scheduled` standing in for `confirmed`.
    /// Cancelling and rescheduling are allowed until the visit happens; a no-show can only
    /// be recorded for a confirmed visit. Setting the current status again is a no-op.
    pub fn is_nominal_transition(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        if *self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Confirmed | Scheduled | Cancelled | Rescheduled),
            Confirmed | Scheduled => matches!(
                next,
                Confirmed | Scheduled | Completed | Cancelled | Rescheduled | NoShow
            ),
            Completed | Cancelled | Rescheduled | NoShow => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "appointment status",
                value: s.to_string(),
            })
    }
}

fn parse_status(value: &str) -> CoreResult<AppointmentStatus> {
    value.parse().map_err(|_| {
        let allowed: Vec<&str> = AppointmentStatus::ALL.iter().map(|s| s.as_str()).collect();
        CoreError::validation(format!("status must be one of {}", allowed.join(", ")))
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: RecordId,
    #[schema(value_type = String)]
    pub doctor: RecordId,
    #[schema(value_type = String)]
    pub patient: RecordId,
    pub date: NaiveDate,
    /// `HH:MM`, 24 hour clock.
    pub time: String,
    pub status: AppointmentStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct NewAppointment {
    pub patient: Option<String>,
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of an appointment. The status has its own operation.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct AppointmentPatch {
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    /// An empty string clears the notes.
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

impl StatusUpdate {
    pub fn parse(self) -> CoreResult<AppointmentStatus> {
        let raw = required_text("status", self.status)?;
        parse_status(raw.as_str())
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentQuery {
    /// First day included, `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Last day included, `YYYY-MM-DD`.
    pub to: Option<String>,
    pub status: Option<String>,
    pub doctor: Option<String>,
    pub patient: Option<String>,
}

fn map_appointment(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: id_column(row, 0)?,
        doctor: id_column(row, 1)?,
        patient: id_column(row, 2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        status: tag_column(row, 5)?,
        reason: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn load_appointment(conn: &Connection, id: RecordId) -> CoreResult<Appointment> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id.to_string()],
        map_appointment,
    )
    .optional()?
    .ok_or(CoreError::NotFound("Appointment"))
}

/// Returns the id of another live appointment held by `patient` on `date`, if any.
fn active_on_day(
    conn: &Connection,
    patient: RecordId,
    date: NaiveDate,
    except: Option<RecordId>,
) -> CoreResult<Option<RecordId>> {
    let except = except.map(|id| id.to_string()).unwrap_or_default();
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM appointments
             WHERE patient_id = ?1 AND date = ?2 AND status <> 'cancelled' AND id <> ?3
             LIMIT 1",
            params![patient.to_string(), date, except],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.and_then(|raw| RecordId::parse(&raw).ok()))
}

fn day_taken(date: NaiveDate, existing: Option<RecordId>) -> CoreError {
    match existing {
        Some(id) => CoreError::Conflict(format!(
            "Patient already has an appointment on {date} (appointment {id})"
        )),
        None => CoreError::Conflict(format!("Patient already has an appointment on {date}")),
    }
}

fn ensure_day_free(
    conn: &Connection,
    patient: RecordId,
    date: NaiveDate,
    except: Option<RecordId>,
) -> CoreResult<()> {
    match active_on_day(conn, patient, date, except)? {
        Some(existing) => Err(day_taken(date, Some(existing))),
        None => Ok(()),
    }
}

fn write_appointment(conn: &Connection, a: &Appointment) -> CoreResult<()> {
    conn.execute(
        "UPDATE appointments SET doctor_id = ?1, date = ?2, time = ?3, status = ?4, reason = ?5,
             notes = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            a.doctor.to_string(),
            a.date,
            a.time,
            a.status.as_str(),
            a.reason,
            a.notes,
            a.updated_at,
            a.id.to_string(),
        ],
    )?;
    Ok(())
}

#[derive(Clone, Debug)]
pub struct AppointmentService {
    store: Store,
}

impl AppointmentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Books an appointment with status `pending`.
    ///
    /// # Errors
    ///
    /// - `Validation` for a missing or malformed field
    /// - `NotFound("Patient")` / `NotFound("Doctor")` for an unknown reference
    /// - `Conflict` naming the existing appointment when the patient's day is taken
    pub fn create(&self, input: NewAppointment) -> CoreResult<Appointment> {
        let patient = required_id("patient", input.patient)?;
        let doctor = required_id("doctor", input.doctor)?;
        let date = parse_date("date", required_text("date", input.date)?.as_str())?;
        let time = parse_time("time", required_text("time", input.time)?.as_str())?;
        let reason = required_text("reason", input.reason)?.into_inner();
        let notes = optional_text(input.notes);

        let now = Utc::now();
        let appointment = Appointment {
            id: RecordId::new(),
            doctor,
            patient,
            date,
            time,
            status: AppointmentStatus::Pending,
            reason,
            notes,
            created_at: now,
            updated_at: now,
        };

        let result = self.store.with_tx(|tx| {
            require_patient(tx, patient)?;
            require_doctor(tx, doctor)?;
            ensure_day_free(tx, patient, date, None)?;
            tx.execute(
                &format!(
                    "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    appointment.id.to_string(),
                    doctor.to_string(),
                    patient.to_string(),
                    date,
                    appointment.time,
                    appointment.status.as_str(),
                    appointment.reason,
                    appointment.notes,
                    appointment.created_at,
                    appointment.updated_at,
                ],
            )?;
            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    patient_id = %patient,
                    doctor_id = %doctor,
                    %date,
                    "booked appointment"
                );
                Ok(appointment)
            }
            Err(e) => Err(self.index_conflict(e, patient, date, None)),
        }
    }

    pub fn get(&self, id: RecordId) -> CoreResult<Appointment> {
        self.store.with_conn(|conn| load_appointment(conn, id))
    }

    /// Changes the doctor, date, time, reason or notes. Moving a live appointment to another
    /// day re-checks that day for the patient.
    pub fn update(&self, id: RecordId, patch: AppointmentPatch) -> CoreResult<Appointment> {
        let new_date = patch
            .date
            .as_deref()
            .map(|raw| parse_date("date", raw))
            .transpose()?;

        let result = self.store.with_tx(|tx| {
            let mut appointment = load_appointment(tx, id)?;

            if let Some(raw) = patch.doctor {
                let doctor = parse_id("doctor", &raw)?;
                require_doctor(tx, doctor)?;
                appointment.doctor = doctor;
            }
            if let Some(date) = new_date {
                appointment.date = date;
            }
            if let Some(raw) = patch.time {
                appointment.time = parse_time("time", &raw)?;
            }
            if let Some(reason) = patch.reason {
                appointment.reason = required_text("reason", Some(reason))?.into_inner();
            }
            if let Some(notes) = patch.notes {
                appointment.notes = optional_text(Some(notes));
            }

            if appointment.status.is_active() {
                ensure_day_free(tx, appointment.patient, appointment.date, Some(id))?;
            }

            appointment.updated_at = Utc::now();
            write_appointment(tx, &appointment)?;
            Ok(appointment)
        });

        match result {
            Err(e) if e.is_constraint_violation() => {
                let current = self.get(id)?;
                let date = new_date.unwrap_or(current.date);
                Err(self.index_conflict(e, current.patient, date, Some(id)))
            }
            other => other,
        }
    }

    /// Sets a new status.
    ///
    /// Any status may follow any other unless the store was configured with strict
    /// transitions, in which case off-lifecycle changes fail with `InvalidTransition`.
    /// Reviving a cancelled appointment still needs the patient's day to be free.
    pub fn update_status(&self, id: RecordId, status: AppointmentStatus) -> CoreResult<Appointment> {
        let strict = self.store.config().strict_status_transitions();

        let result = self.store.with_tx(|tx| {
            let mut appointment = load_appointment(tx, id)?;
            let current = appointment.status;

            if !current.is_nominal_transition(status) {
                if strict {
                    return Err(CoreError::InvalidTransition {
                        from: current.to_string(),
                        to: status.to_string(),
                    });
                }
                tracing::warn!(
                    appointment_id = %id,
                    from = %current,
                    to = %status,
                    "appointment status changed outside the usual lifecycle"
                );
            }

            if status.is_active() && !current.is_active() {
                ensure_day_free(tx, appointment.patient, appointment.date, Some(id))?;
            }

            appointment.status = status;
            appointment.updated_at = Utc::now();
            write_appointment(tx, &appointment)?;
            Ok(appointment)
        });

        match result {
            Err(e) if e.is_constraint_violation() => {
                let current = self.get(id)?;
                Err(self.index_conflict(e, current.patient, current.date, Some(id)))
            }
            other => other,
        }
    }

    /// Turns a unique-index rejection into the conflict the day check would have raised,
    /// naming the appointment that holds the day. Other errors pass through.
    fn index_conflict(
        &self,
        err: CoreError,
        patient: RecordId,
        date: NaiveDate,
        except: Option<RecordId>,
    ) -> CoreError {
        if !err.is_constraint_violation() {
            return err;
        }
        let existing = self
            .store
            .with_conn(|conn| active_on_day(conn, patient, date, except))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not look up the conflicting appointment");
                None
            });
        day_taken(date, existing)
    }

    pub fn delete(&self, id: RecordId) -> CoreResult<()> {
        let removed = self.store.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM appointments WHERE id = ?1",
                params![id.to_string()],
            )?)
        })?;
        if removed == 0 {
            return Err(CoreError::NotFound("Appointment"));
        }
        tracing::info!(appointment_id = %id, "deleted appointment");
        Ok(())
    }

    /// Lists appointments matching `query`, ordered by date then time.
    pub fn list(&self, query: AppointmentQuery) -> CoreResult<Vec<Appointment>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(raw) = optional_text(query.from) {
            clauses.push("date >= ?");
            args.push(Value::Text(parse_date("from", &raw)?.to_string()));
        }
        if let Some(raw) = optional_text(query.to) {
            clauses.push("date <= ?");
            args.push(Value::Text(parse_date("to", &raw)?.to_string()));
        }
        if let Some(raw) = optional_text(query.status) {
            clauses.push("status = ?");
            args.push(Value::Text(parse_status(&raw)?.as_str().to_string()));
        }
        if let Some(raw) = optional_text(query.doctor) {
            clauses.push("doctor_id = ?");
            args.push(Value::Text(parse_id("doctor", &raw)?.to_string()));
        }
        if let Some(raw) = optional_text(query.patient) {
            clauses.push("patient_id = ?");
            args.push(Value::Text(parse_id("patient", &raw)?.to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments{where_sql}
                 ORDER BY date, time, created_at"
            ))?;
            let appointments = stmt
                .query_map(params_from_iter(args.iter()), map_appointment)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(appointments)
        })
    }

    /// Like [`list`](Self::list) but restricted to one doctor, who must exist.
    pub fn list_for_doctor(
        &self,
        doctor: RecordId,
        mut query: AppointmentQuery,
    ) -> CoreResult<Vec<Appointment>> {
        self.store.with_conn(|conn| require_doctor(conn, doctor))?;
        query.doctor = Some(doctor.to_string());
        self.list(query)
    }
}
