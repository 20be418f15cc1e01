use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use attendance_watch::config::{AppConfig, ConfigOverrides};
use attendance_watch::credentials::CredentialStore;
use attendance_watch::error::{self, AttendanceError};
use attendance_watch::models::{AttendanceTable, Role};
use attendance_watch::session::Session;
use attendance_watch::{analytics, report, risk};

#[derive(Parser)]
#[command(name = "attendance-watch")]
#[command(about = "Attendance tracking and detention risk for students and faculty", long_about = None)]
struct Cli {
    /// Show informational logs on stderr
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Suppress all logs
    #[arg(long, global = true)]
    quiet: bool,
    /// Directory holding attendance.csv and daily_attendance.csv
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    users_file: Option<PathBuf>,
    #[arg(long, global = true)]
    summary_file: Option<PathBuf>,
    #[arg(long, global = true)]
    daily_file: Option<PathBuf>,
    /// How many leading rows to try as the header row
    #[arg(long, global = true)]
    max_header_rows: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Student,
    Faculty,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Student => Role::Student,
            RoleArg::Faculty => Role::Faculty,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new student or faculty account
    Register {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
    /// Check credentials and show the account role
    Login {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Attendance percentage and detention flag for every student (faculty)
    Summary {
        #[command(flatten)]
        credentials: Credentials,
        /// Use the daily attendance file instead of the summary file
        #[arg(long)]
        daily: bool,
        #[arg(long)]
        json: bool,
    },
    /// One student's attendance record; students always see their own
    Student {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        roll: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Students absent on a date for a class or subject (faculty)
    #[command(group(
        ArgGroup::new("target")
            .args(["class", "subject"])
            .required(true)
            .multiple(false)
    ))]
    Absentees {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        date: String,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Classes a student missed in the daily attendance file
    Bunked {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        roll: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Dates, classes and subjects available in the daily attendance file (faculty)
    Catalog {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Average attendance and percentage distribution (faculty)
    Overview {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        daily: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report (faculty)
    Report {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        daily: bool,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = AppConfig::resolve(ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        users_file: cli.users_file.clone(),
        summary_file: cli.summary_file.clone(),
        daily_file: cli.daily_file.clone(),
        max_header_rows: cli.max_header_rows,
    });
    let store = CredentialStore::new(&config.users_file);

    match cli.command {
        Commands::Register { credentials, role } => {
            let credential = store
                .register(&credentials.username, &credentials.password, role.into())
                .context("registration failed")?;
            println!(
                "Registered {} as {}. Please log in.",
                credential.username, credential.role
            );
        }
        Commands::Login { credentials } => {
            let session = login(&config, &store, &credentials)?;
            println!("Welcome {} ({}).", session.username, role_label(&session));
        }
        Commands::Summary {
            credentials,
            daily,
            json,
        } => {
            let session = login(&config, &store, &credentials)?;
            session.require(Role::Faculty)?;
            let table = load_table(&config, source_path(&config, daily))?;
            let Some(summaries) = degrade(analytics::summarize(&table))? else {
                return Ok(());
            };

            if json {
                print_json(&summaries)?;
            } else if summaries.is_empty() {
                println!("No students found in this source.");
            } else {
                println!("Attendance per student:");
                for summary in &summaries {
                    let counts = match (summary.classes_attended, summary.total_classes) {
                        (Some(attended), Some(total)) => format!(" ({attended}/{total} classes)"),
                        _ => String::new(),
                    };
                    println!(
                        "- {} {:.2}%{} {}",
                        summary.roll_no,
                        summary.percent,
                        counts,
                        if summary.detained { "AT RISK" } else { "safe" }
                    );
                }
            }
        }
        Commands::Student {
            credentials,
            roll,
            json,
        } => {
            let session = login(&config, &store, &credentials)?;
            let roll = target_roll(&session, roll)?;
            let table = load_table(&config, &config.summary_file)?;
            let Some(record) = degrade(analytics::student_record(&table, &roll))? else {
                return Ok(());
            };

            if json {
                print_json(&record)?;
                return Ok(());
            }

            let summary = &record.summary;
            println!("Attendance record for {}", summary.roll_no);
            println!("- Attendance: {:.2}%", summary.percent);
            if let (Some(attended), Some(total)) = (summary.classes_attended, summary.total_classes) {
                println!("- Classes attended: {attended} of {total}");
            }
            println!(
                "- Progress towards {:.0}%: {:.0}% ({})",
                risk::DETENTION_THRESHOLD,
                record.progress * 100.0,
                record.band.label()
            );
            if summary.detained {
                println!("- At risk of DETENTION");
                match record.needed_classes {
                    Some(needed) => println!(
                        "- Attend {needed} more consecutive classes to reach {:.0}%",
                        risk::DETENTION_THRESHOLD
                    ),
                    None => println!("- Total classes unknown; cannot plan recovery"),
                }
            } else {
                println!("- Maintaining safe attendance");
            }
            if record.subjects.is_empty() {
                println!("No numeric subject columns found.");
            } else {
                println!("Subject-wise:");
                for score in &record.subjects {
                    println!("  - {}: {}", score.subject, score.value);
                }
            }
        }
        Commands::Absentees {
            credentials,
            date,
            class,
            subject,
            json,
        } => {
            let session = login(&config, &store, &credentials)?;
            session.require(Role::Faculty)?;
            let target = class.or(subject).context("either --class or --subject is required")?;
            let table = load_table(&config, &config.daily_file)?;
            let Some(absent) = degrade(analytics::absentees_on(&table, &date, &target))? else {
                return Ok(());
            };

            if json {
                print_json(&absent)?;
            } else if absent.is_empty() {
                println!("No students were absent in {target} on {date}.");
            } else {
                println!("Absent in {target} on {date}:");
                for roll_no in &absent {
                    println!("- {roll_no}");
                }
            }
        }
        Commands::Bunked {
            credentials,
            roll,
            json,
        } => {
            let session = login(&config, &store, &credentials)?;
            let roll = target_roll(&session, roll)?;
            let table = load_table(&config, &config.daily_file)?;
            let Some(bunked) = degrade(analytics::bunked_classes(&table, &roll))? else {
                return Ok(());
            };

            if json {
                print_json(&bunked)?;
            } else if bunked.is_empty() {
                println!("{roll} has not missed any classes.");
            } else {
                println!("Classes missed by {roll}:");
                for class in &bunked {
                    println!("- {} {}", class.date, class.subject);
                }
            }
        }
        Commands::Catalog { credentials } => {
            let session = login(&config, &store, &credentials)?;
            session.require(Role::Faculty)?;
            let table = load_table(&config, &config.daily_file)?;
            println!("Dates: {}", table.dates().join(", "));
            let classes = table.classes();
            if !classes.is_empty() {
                println!("Classes: {}", classes.join(", "));
            }
            let subjects = table.subject_columns();
            if !subjects.is_empty() {
                println!("Subjects: {}", subjects.join(", "));
            }
        }
        Commands::Overview {
            credentials,
            daily,
            json,
        } => {
            let session = login(&config, &store, &credentials)?;
            session.require(Role::Faculty)?;
            let table = load_table(&config, source_path(&config, daily))?;
            let Some(summaries) = degrade(analytics::summarize(&table))? else {
                return Ok(());
            };
            let overview = analytics::class_overview(&summaries);

            if json {
                print_json(&overview)?;
            } else if let Some(average) = overview.average_percent {
                println!("Students: {}", overview.student_count);
                println!("Average attendance: {average:.2}%");
                println!("At risk of detention: {}", overview.detained_count);
                for band in &overview.distribution {
                    println!("  {:>3.0}-{:<3.0}% {}", band.lower, band.upper, "#".repeat(band.count));
                }
            } else {
                println!("No students found in this source.");
            }
        }
        Commands::Report {
            credentials,
            daily,
            out,
        } => {
            let session = login(&config, &store, &credentials)?;
            session.require(Role::Faculty)?;
            let path = source_path(&config, daily);
            let table = load_table(&config, path)?;
            let Some(summaries) = degrade(analytics::summarize(&table))? else {
                return Ok(());
            };
            let absences = if daily {
                degrade(analytics::absences_by_date(&table))?.unwrap_or_default()
            } else {
                Vec::new()
            };
            let report = report::build_report(
                &path.display().to_string(),
                chrono::Local::now().date_naive(),
                &summaries,
                &absences,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn login(config: &AppConfig, store: &CredentialStore, credentials: &Credentials) -> anyhow::Result<Session> {
    let roster = if config.summary_file.exists() {
        match config.sniffer().read_path(&config.summary_file) {
            Ok(table) => Some(table),
            Err(err) => {
                tracing::warn!(error = %err, "attendance roster unreadable");
                Some(AttendanceTable::default())
            }
        }
    } else {
        None
    };

    Session::login(store, &credentials.username, &credentials.password, roster.as_ref())
        .context("login failed")
}

fn role_label(session: &Session) -> &'static str {
    session.role.map(Role::as_str).unwrap_or("guest")
}

/// Students may only look at their own roll number; faculty must name one.
fn target_roll(session: &Session, roll: Option<String>) -> anyhow::Result<String> {
    match session.role {
        Some(Role::Student) => Ok(session.username.clone()),
        Some(Role::Faculty) => roll.context("--roll is required for faculty accounts"),
        None => anyhow::bail!("not logged in"),
    }
}

fn source_path(config: &AppConfig, daily: bool) -> &Path {
    if daily {
        &config.daily_file
    } else {
        &config.summary_file
    }
}

fn load_table(config: &AppConfig, path: &Path) -> anyhow::Result<AttendanceTable> {
    if !path.exists() {
        anyhow::bail!(
            "no attendance file found at {}; place one there first",
            path.display()
        );
    }
    config
        .sniffer()
        .read_path(path)
        .with_context(|| format!("failed to load {}", path.display()))
}

/// Missing columns, unknown students and undefined metrics become a
/// "no data" message rather than a failure; everything else propagates.
fn degrade<T>(result: error::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            err @ (AttendanceError::MissingColumn(_)
            | AttendanceError::UnknownStudent(_)
            | AttendanceError::UndefinedMetric(_)),
        ) => {
            println!("No data: {err}.");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
