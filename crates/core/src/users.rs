//! Staff credential store.
//!
//! Admins, doctors and receptionists live in one `users` table keyed by `(role, email)`, so
//! the same email may hold separate accounts under different roles and a login only ever
//! looks inside the collection of the role it claims.
//!
//! A doctor's patient and appointment lists are not stored on the doctor. They are derived
//! from `patients.assigned_doctor` and `appointments.doctor_id` when a [`DoctorProfile`] is
//! read.

use crate::constants::MIN_PASSWORD_LEN;
use crate::password::PasswordHasher;
use crate::role::Role;
use crate::store::{id_column, tag_column, Store};
use crate::validation::{optional_text, required_email, required_text};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use curamind_uuid::RecordId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const USER_COLUMNS: &str =
    "id, role, name, email, specialization, phone, created_at, updated_at, password_hash";

/// A staff account with the password hash stripped.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: RecordId,
    pub role: Role,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A doctor together with the derived reverse lookups.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: User,
    #[schema(value_type = Vec<String>)]
    pub patients: Vec<RecordId>,
    #[schema(value_type = Vec<String>)]
    pub appointments: Vec<RecordId>,
}

/// Body of an account creation request.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
}

/// Partial update of an account. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
}

struct StoredUser {
    user: User,
    password_hash: String,
}

fn map_stored_user(row: &Row<'_>) -> rusqlite::Result<StoredUser> {
    Ok(StoredUser {
        user: User {
            id: id_column(row, 0)?,
            role: tag_column(row, 1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            specialization: row.get(4)?,
            phone: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        },
        password_hash: row.get(8)?,
    })
}

fn load_user(conn: &Connection, id: RecordId, role: Role) -> CoreResult<StoredUser> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND role = ?2"),
        params![id.to_string(), role.as_str()],
        map_stored_user,
    )
    .optional()?
    .ok_or(CoreError::NotFound(role.label()))
}

fn email_taken(
    conn: &Connection,
    role: Role,
    email: &str,
    except: Option<RecordId>,
) -> CoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE role = ?1 AND email = ?2",
            params![role.as_str(), email],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (found, except) {
        (None, _) => false,
        (Some(id), Some(except)) => id != except.to_string(),
        (Some(_), None) => true,
    })
}

fn duplicate_email(role: Role) -> CoreError {
    CoreError::Conflict(format!(
        "A {} with this email already exists",
        role.as_str()
    ))
}

/// Fails with `Doctor not found` unless `id` names a doctor account.
pub(crate) fn require_doctor(conn: &Connection, id: RecordId) -> CoreResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1 AND role = 'doctor'",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    exists.map(|_| ()).ok_or(CoreError::NotFound("Doctor"))
}

fn validate_password(password: Option<String>) -> CoreResult<String> {
    let password = password.unwrap_or_default();
    if password.is_empty() {
        return Err(CoreError::validation("password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password)
}

#[derive(Clone, Debug)]
pub struct UserService {
    store: Store,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: Store) -> Self {
        let hasher = PasswordHasher::new(store.config().password_iterations());
        Self { store, hasher }
    }

    /// Creates a staff account.
    ///
    /// # Errors
    ///
    /// - `Validation` for a missing name/email/password, a password shorter than six
    ///   characters, a doctor without specialization, or a non-staff role
    /// - `Conflict` when the email is already used by another account of the same role
    pub fn create(&self, role: Role, new_user: NewUser) -> CoreResult<User> {
        if !role.has_credentials() {
            return Err(CoreError::validation(format!(
                "{} accounts cannot be created",
                role.as_str()
            )));
        }

        let name = required_text("name", new_user.name)?;
        let email = required_email("email", new_user.email)?;
        let password = validate_password(new_user.password)?;
        let specialization = optional_text(new_user.specialization);
        if role == Role::Doctor && specialization.is_none() {
            return Err(CoreError::validation("specialization is required"));
        }
        let phone = optional_text(new_user.phone);

        let password_hash = self.hasher.hash(&password);
        let now = Utc::now();
        let user = User {
            id: RecordId::new(),
            role,
            name: name.into_inner(),
            email: email.as_str().to_string(),
            specialization: if role == Role::Doctor {
                specialization
            } else {
                None
            },
            phone,
            created_at: now,
            updated_at: now,
        };

        let result = self.store.with_tx(|tx| {
            if email_taken(tx, role, &user.email, None)? {
                return Err(duplicate_email(role));
            }
            tx.execute(
                "INSERT INTO users (id, role, name, email, password_hash, specialization, phone, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id.to_string(),
                    role.as_str(),
                    user.name,
                    user.email,
                    password_hash,
                    user.specialization,
                    user.phone,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::info!(user_id = %user.id, role = %role, "created staff account");
                Ok(user)
            }
            Err(e) if e.is_constraint_violation() => Err(duplicate_email(role)),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: RecordId, role: Role) -> CoreResult<User> {
        self.store
            .with_conn(|conn| load_user(conn, id, role).map(|s| s.user))
    }

    /// Lists all accounts of `role`, ordered by name.
    pub fn list(&self, role: Role) -> CoreResult<Vec<User>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY name COLLATE NOCASE, created_at"
            ))?;
            let users = stmt
                .query_map(params![role.as_str()], map_stored_user)?
                .map(|r| r.map(|s| s.user))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Applies a partial update. Supplying `password` replaces the stored hash.
    pub fn update(&self, id: RecordId, role: Role, patch: UserPatch) -> CoreResult<User> {
        let new_hash = match patch.password {
            Some(pw) => Some(self.hasher.hash(&validate_password(Some(pw))?)),
            None => None,
        };

        let result = self.store.with_tx(|tx| {
            let mut user = load_user(tx, id, role)?.user;

            if let Some(name) = patch.name {
                user.name = required_text("name", Some(name))?.into_inner();
            }
            if let Some(email) = patch.email {
                let email = required_email("email", Some(email))?;
                if email_taken(tx, role, email.as_str(), Some(id))? {
                    return Err(duplicate_email(role));
                }
                user.email = email.as_str().to_string();
            }
            if let Some(specialization) = patch.specialization {
                if role == Role::Doctor {
                    user.specialization = Some(
                        required_text("specialization", Some(specialization))?.into_inner(),
                    );
                }
            }
            if let Some(phone) = patch.phone {
                user.phone = optional_text(Some(phone));
            }
            user.updated_at = Utc::now();

            tx.execute(
                "UPDATE users SET name = ?1, email = ?2, specialization = ?3, phone = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    user.name,
                    user.email,
                    user.specialization,
                    user.phone,
                    user.updated_at,
                    id.to_string(),
                ],
            )?;
            if let Some(hash) = &new_hash {
                tx.execute(
                    "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                    params![hash, id.to_string()],
                )?;
            }
            Ok(user)
        });

        match result {
            Err(e) if e.is_constraint_violation() => Err(duplicate_email(role)),
            other => other,
        }
    }

    /// Deletes an account.
    ///
    /// Deleting a doctor also clears `assignedDoctor` on their patients and removes their
    /// appointments (and, through the schema, their prescriptions) in the same transaction.
    pub fn delete(&self, id: RecordId, role: Role) -> CoreResult<()> {
        self.store.with_tx(|tx| {
            load_user(tx, id, role)?;
            let id_str = id.to_string();

            if role == Role::Doctor {
                let unassigned = tx.execute(
                    "UPDATE patients SET assigned_doctor = NULL, updated_at = ?1 WHERE assigned_doctor = ?2",
                    params![Utc::now(), id_str],
                )?;
                let appointments = tx.execute(
                    "DELETE FROM appointments WHERE doctor_id = ?1",
                    params![id_str],
                )?;
                tracing::info!(
                    doctor_id = %id,
                    unassigned,
                    appointments,
                    "removed doctor back-references"
                );
            }

            tx.execute("DELETE FROM users WHERE id = ?1", params![id_str])?;
            Ok(())
        })?;

        tracing::info!(user_id = %id, role = %role, "deleted staff account");
        Ok(())
    }

    /// Checks a login attempt.
    ///
    /// The email is normalised before lookup. An unknown account and a wrong password both
    /// yield [`CoreError::InvalidCredentials`], and a dummy hash is computed for unknown
    /// accounts so response timing does not tell them apart.
    pub fn authenticate(&self, email: &str, password: &str, role: Role) -> CoreResult<User> {
        let normalised = email.trim().to_lowercase();
        let stored = self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE role = ?1 AND email = ?2"),
                    params![role.as_str(), normalised],
                    map_stored_user,
                )
                .optional()?)
        })?;

        match stored {
            Some(stored) if self.hasher.verify(password, &stored.password_hash) => {
                Ok(stored.user)
            }
            Some(stored) => {
                tracing::debug!(user_id = %stored.user.id, "login rejected: password mismatch");
                Err(CoreError::InvalidCredentials)
            }
            None => {
                self.hasher.verify_dummy(password);
                tracing::debug!(role = %role, "login rejected: no such account");
                Err(CoreError::InvalidCredentials)
            }
        }
    }

    /// Reads a doctor with their derived patient and appointment id lists.
    pub fn doctor_profile(&self, id: RecordId) -> CoreResult<DoctorProfile> {
        self.store.with_conn(|conn| {
            let doctor = load_user(conn, id, Role::Doctor)?.user;
            let id_str = id.to_string();

            let mut stmt = conn.prepare(
                "SELECT id FROM patients WHERE assigned_doctor = ?1 ORDER BY created_at, id",
            )?;
            let patients = stmt
                .query_map(params![id_str], |row| id_column(row, 0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT id FROM appointments WHERE doctor_id = ?1 ORDER BY date, time, created_at",
            )?;
            let appointments = stmt
                .query_map(params![id_str], |row| id_column(row, 0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(DoctorProfile {
                doctor,
                patients,
                appointments,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, new_doctor};

    #[test]
    fn test_create_normalises_email_and_hides_hash() {
        let users = UserService::new(memory_store());
        let doctor = users
            .create(Role::Doctor, new_doctor("  Grey@Hospital.ORG "))
            .expect("create should succeed");

        assert_eq!(doctor.email, "grey@hospital.org");
        assert_eq!(doctor.role, Role::Doctor);

        let json = serde_json::to_value(&doctor).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["_id"], doctor.id.to_string());
    }

    #[test]
    fn test_create_requires_doctor_specialization() {
        let users = UserService::new(memory_store());
        let mut input = new_doctor("a@b.org");
        input.specialization = None;

        let err = users.create(Role::Doctor, input).expect_err("should fail");
        assert!(matches!(err, CoreError::Validation(m) if m == "specialization is required"));
    }

    #[test]
    fn test_create_rejects_short_password_and_patient_role() {
        let users = UserService::new(memory_store());
        let mut input = new_doctor("a@b.org");
        input.password = Some("123".into());
        assert!(matches!(
            users.create(Role::Doctor, input),
            Err(CoreError::Validation(_))
        ));

        assert!(matches!(
            users.create(Role::Patient, new_doctor("p@b.org")),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_email_is_scoped_to_role() {
        let users = UserService::new(memory_store());
        users.create(Role::Doctor, new_doctor("dup@h.org")).unwrap();

        let err = users
            .create(Role::Doctor, new_doctor("DUP@h.org"))
            .expect_err("duplicate within role should fail");
        assert!(matches!(err, CoreError::Conflict(_)));

        users
            .create(Role::Admin, new_doctor("dup@h.org"))
            .expect("same email under another role is allowed");
    }

    #[test]
    fn test_authenticate_uniform_failures() {
        let users = UserService::new(memory_store());
        users.create(Role::Doctor, new_doctor("grey@h.org")).unwrap();

        let ok = users
            .authenticate(" GREY@h.org", "doctor-pass", Role::Doctor)
            .expect("correct credentials should pass");
        assert_eq!(ok.email, "grey@h.org");

        let wrong_password = users
            .authenticate("grey@h.org", "nope-nope", Role::Doctor)
            .unwrap_err();
        let unknown_email = users
            .authenticate("ghost@h.org", "doctor-pass", Role::Doctor)
            .unwrap_err();
        let wrong_role = users
            .authenticate("grey@h.org", "doctor-pass", Role::Admin)
            .unwrap_err();

        for err in [wrong_password, unknown_email, wrong_role] {
            assert!(matches!(err, CoreError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid credentials");
        }
    }

    #[test]
    fn test_update_changes_fields_and_password() {
        let users = UserService::new(memory_store());
        let doctor = users.create(Role::Doctor, new_doctor("grey@h.org")).unwrap();

        let updated = users
            .update(
                doctor.id,
                Role::Doctor,
                UserPatch {
                    name: Some("Dr. Meredith Grey".into()),
                    password: Some("new-password".into()),
                    ..Default::default()
                },
            )
            .expect("update should succeed");
        assert_eq!(updated.name, "Dr. Meredith Grey");
        assert_eq!(updated.specialization.as_deref(), Some("Cardiology"));

        assert!(users
            .authenticate("grey@h.org", "doctor-pass", Role::Doctor)
            .is_err());
        assert!(users
            .authenticate("grey@h.org", "new-password", Role::Doctor)
            .is_ok());
    }

    #[test]
    fn test_update_rejects_email_of_other_account() {
        let users = UserService::new(memory_store());
        users.create(Role::Receptionist, new_doctor("one@h.org")).unwrap();
        let two = users.create(Role::Receptionist, new_doctor("two@h.org")).unwrap();

        let err = users
            .update(
                two.id,
                Role::Receptionist,
                UserPatch {
                    email: Some("one@h.org".into()),
                    ..Default::default()
                },
            )
            .expect_err("email collision should fail");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_get_with_wrong_role_is_not_found() {
        let users = UserService::new(memory_store());
        let doctor = users.create(Role::Doctor, new_doctor("grey@h.org")).unwrap();

        let err = users.get(doctor.id, Role::Receptionist).unwrap_err();
        assert!(matches!(err, CoreError::NotFound("Receptionist")));
        assert_eq!(users.get(doctor.id, Role::Doctor).unwrap().id, doctor.id);
    }

    #[test]
    fn test_list_only_returns_requested_role() {
        let users = UserService::new(memory_store());
        users.create(Role::Doctor, new_doctor("d1@h.org")).unwrap();
        users.create(Role::Doctor, new_doctor("d2@h.org")).unwrap();
        users.create(Role::Admin, new_doctor("a@h.org")).unwrap();

        assert_eq!(users.list(Role::Doctor).unwrap().len(), 2);
        assert_eq!(users.list(Role::Admin).unwrap().len(), 1);
        assert!(users.list(Role::Receptionist).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_account_is_not_found() {
        let users = UserService::new(memory_store());
        let err = users.delete(RecordId::new(), Role::Doctor).unwrap_err();
        assert!(matches!(err, CoreError::NotFound("Doctor")));
    }
}
