use anyhow::Context;
use clap::{Parser, Subcommand};
use curamind_core::appointments::{AppointmentQuery, AppointmentService};
use curamind_core::config::{
    database_path_from_env_value, flag_from_env_value, password_iterations_from_env_value,
};
use curamind_core::patients::{PatientQuery, PatientService};
use curamind_core::users::{NewUser, UserService};
use curamind_core::{CoreConfig, Role, Store};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "curamind")]
#[command(about = "CuraMind hospital records CLI")]
struct Cli {
    /// Database file (defaults to CURAMIND_DATABASE_PATH, then curamind.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an admin account, typically the first one
    CreateAdmin {
        /// Display name
        name: String,
        /// Login email
        email: String,
        /// Password (falls back to CURAMIND_ADMIN_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },
    /// List all doctors
    ListDoctors,
    /// List patients
    ListPatients {
        /// Name or email substring
        #[arg(long)]
        search: Option<String>,
        /// City
        #[arg(long)]
        city: Option<String>,
        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,
    },
    /// List appointments ordered by date and time
    ListAppointments {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Status such as pending or cancelled
        #[arg(long)]
        status: Option<String>,
        /// Doctor id
        #[arg(long)]
        doctor: Option<String>,
    },
}

fn open_store(database: Option<PathBuf>) -> anyhow::Result<Store> {
    let path = database.unwrap_or_else(|| {
        database_path_from_env_value(std::env::var("CURAMIND_DATABASE_PATH").ok())
    });
    let iterations =
        password_iterations_from_env_value(std::env::var("CURAMIND_PASSWORD_ITERATIONS").ok())?;
    let strict =
        flag_from_env_value(std::env::var("CURAMIND_STRICT_STATUS_TRANSITIONS").ok())?;

    let cfg = CoreConfig::new(path, iterations, strict)?;
    Store::open(Arc::new(cfg)).context("failed to open the record store")
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'curamind --help' for commands");
        return Ok(());
    };
    let store = open_store(cli.database)?;

    match command {
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => {
            let password = password
                .or_else(|| std::env::var("CURAMIND_ADMIN_PASSWORD").ok())
                .context("no password given; pass --password or set CURAMIND_ADMIN_PASSWORD")?;
            let admin = UserService::new(store).create(
                Role::Admin,
                NewUser {
                    name: Some(name),
                    email: Some(email),
                    password: Some(password),
                    ..Default::default()
                },
            )?;
            println!("Created admin {} with ID: {}", admin.email, admin.id);
        }
        Commands::ListDoctors => {
            let doctors = UserService::new(store).list(Role::Doctor)?;
            if doctors.is_empty() {
                println!("No doctors found.");
            }
            for doctor in doctors {
                println!(
                    "ID: {}, Name: {}, Email: {}, Specialization: {}",
                    doctor.id,
                    doctor.name,
                    doctor.email,
                    doctor.specialization.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::ListPatients { search, city, page } => {
            let result = PatientService::new(store).list(PatientQuery {
                search,
                city,
                page,
                ..Default::default()
            })?;
            if result.patients.is_empty() {
                println!("No patients found.");
            }
            for patient in &result.patients {
                println!(
                    "ID: {}, Name: {}, Email: {}, City: {}, Doctor: {}",
                    patient.id,
                    patient.name,
                    patient.email,
                    patient.address.city,
                    patient
                        .assigned_doctor
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "-".into())
                );
            }
            println!(
                "Page {} of {} ({} patients)",
                result.page, result.pages, result.total
            );
        }
        Commands::ListAppointments {
            from,
            to,
            status,
            doctor,
        } => {
            let appointments = AppointmentService::new(store).list(AppointmentQuery {
                from,
                to,
                status,
                doctor,
                patient: None,
            })?;
            if appointments.is_empty() {
                println!("No appointments found.");
            }
            for appt in appointments {
                println!(
                    "{} {} [{}] ID: {}, Patient: {}, Doctor: {}, Reason: {}",
                    appt.date, appt.time, appt.status, appt.id, appt.patient, appt.doctor, appt.reason
                );
            }
        }
    }

    Ok(())
}
