//! meal-attendance - school cafeteria check-in and reporting CLI
//!
//! Usage: meal-attendance [--data-dir <DIR>] <COMMAND>
//!
//! Every command loads the data directory, runs, and saves it back when it
//! changed something.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use meal_attendance::{
    export_cancelled, export_daily, export_history, export_monthly, export_to_file,
    import_students, init_tracing, write_import_template, AppConfig, CheckinDesk, CheckinOutcome,
    Clock, DataDir, FixedClock, Membership, Student, StudentChanges, SystemClock, VERSION,
};

/// Meal attendance - cafeteria check-ins, corrections and reports
#[derive(Parser, Debug)]
#[command(name = "meal-attendance")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (overrides MEAL_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import students from a CSV with Nome/Turma columns
    ImportStudents {
        /// Roster CSV file
        csv: PathBuf,

        /// Membership given to every imported student
        #[arg(short, long, default_value = "observacao")]
        membership: Membership,
    },

    /// Add one student to the roster
    AddStudent {
        name: String,
        class: String,

        #[arg(short, long, default_value = "observacao")]
        membership: Membership,

        /// Contract start (monthly contracts default to today)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Contract end
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Change a student's details; omitted fields are kept
    EditStudent {
        student_id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        class: Option<String>,

        #[arg(short, long)]
        membership: Option<Membership>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long, conflicts_with = "clear_end")]
        end: Option<NaiveDate>,

        /// Make the contract open-ended
        #[arg(long)]
        clear_end: bool,

        #[arg(short, long)]
        note: Option<String>,
    },

    /// Delete every student
    ClearStudents {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// List students, optionally filtered by name
    Students {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print a blank roster import template
    Template,

    /// Grant a one-day authorization
    Authorize {
        student_id: String,

        /// Day covered (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Daily authorizations granted for one day
    Authorizations {
        /// Day to list (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Remove a daily authorization
    Unauthorize { authorization_id: String },

    /// Register a check-in
    Checkin {
        student_id: String,

        /// Reference instant, e.g. 2024-06-15T11:30 (defaults to now)
        #[arg(long, value_parser = parse_instant)]
        at: Option<NaiveDateTime>,

        /// Record with the fallback category when the contract is inactive
        #[arg(long)]
        accept_fallback: bool,
    },

    /// Mark a check-in as invalid
    Invalidate { checkin_id: String, reason: String },

    /// Change the membership recorded on a check-in
    Correct {
        checkin_id: String,
        membership: Membership,
        reason: String,
    },

    /// Cancel a student's monthly contract
    Cancel {
        student_id: String,
        reason: String,

        /// Contract end date (defaults to today)
        #[arg(short, long)]
        end: Option<NaiveDate>,
    },

    /// Attendance reports
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Check-ins of one day, newest first
    History {
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Also write the history to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Delete every check-in record
    ClearCheckins {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ReportKind {
    /// Per-category totals of one day
    Daily {
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        export: bool,
    },

    /// Per-student totals of one month
    Monthly {
        year: i32,
        month: u32,

        /// Only this category
        #[arg(short, long)]
        membership: Option<Membership>,

        #[arg(long)]
        export: bool,
    },

    /// Students whose contract was cancelled
    Cancelled {
        #[arg(long)]
        export: bool,
    },
}

fn parse_instant(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("invalid instant {:?}, expected YYYY-MM-DDTHH:MM", raw))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(dir) = cli.data_dir.clone() {
        config = config.with_data_dir(dir);
    }
    init_tracing(Some(config.log_level.as_str()))?;
    info!(version = VERSION, data_dir = %config.data_dir.display(), "meal-attendance starting");

    // `--at` pins the clock for this invocation, otherwise wall time
    let now = match &cli.command {
        Commands::Checkin { at: Some(at), .. } => *at,
        _ => SystemClock.now(),
    };
    let data = DataDir::new(&config.data_dir);
    let mut desk = data.load(FixedClock::new(now))?;

    let changed = run(cli.command, &mut desk, &config)?;
    if changed {
        data.save(&desk)?;
    }
    Ok(())
}

/// Runs one command; returns whether the data changed.
fn run(command: Commands, desk: &mut CheckinDesk<FixedClock>, config: &AppConfig) -> Result<bool> {
    let today = desk.today();

    match command {
        Commands::ImportStudents { csv, membership } => {
            let file = File::open(&csv).with_context(|| format!("Failed to open {:?}", csv))?;
            let students = import_students(file, membership, today)?;
            let added = desk.roster.add_batch(students);
            info!(added, membership = membership.as_str(), "students imported");
            println!("✓ Imported {} students as {}", added, membership);
            Ok(true)
        }

        Commands::AddStudent { name, class, membership, start, end, note } => {
            let mut student = Student::new(&name, &class, membership).with_note(&note);
            student.membership_start = match (start, membership) {
                (Some(start), _) => Some(start),
                (None, Membership::MonthlyContract) => Some(today),
                (None, _) => None,
            };
            student.membership_end = end;
            let id = desk.roster.add(student);
            info!(student_id = %id, "student added");
            println!("✓ Added {} ({})", name, id);
            Ok(true)
        }

        Commands::EditStudent {
            student_id,
            name,
            class,
            membership,
            start,
            end,
            clear_end,
            note,
        } => {
            let changes = StudentChanges {
                name,
                class_label: class,
                membership,
                membership_start: start,
                membership_end: if clear_end { Some(None) } else { end.map(Some) },
                note,
            };
            let student = desk.roster.edit(&student_id, changes)?;
            println!("✓ Updated {} ({})", student.name, student.membership);
            Ok(true)
        }

        Commands::ClearStudents { yes } => {
            if !yes {
                bail!("Refusing to delete every student without --yes");
            }
            let removed = desk.roster.clear();
            println!("✓ Removed {} students", removed);
            Ok(true)
        }

        Commands::Students { search } => {
            let students = match search.as_deref() {
                Some(term) => desk.roster.search(term),
                None => desk.roster.all().iter().collect(),
            };
            for student in &students {
                println!(
                    "{}  {:<30} {:<8} {}",
                    student.id, student.name, student.class_label, student.membership
                );
            }
            println!("\n{} students", students.len());
            for (membership, count) in desk.roster.count_by_membership() {
                println!("  {:<18} {}", membership.label(), count);
            }
            Ok(false)
        }

        Commands::Template => {
            write_import_template(std::io::stdout())?;
            Ok(false)
        }

        Commands::Authorize { student_id, date, note } => {
            let date = date.unwrap_or(today);
            if desk.authorizations.is_authorized(&student_id, date) {
                println!("• {} was already authorized for {}", student_id, date);
            }
            let id = desk
                .authorizations
                .authorize(&desk.roster, &student_id, date, &note)?;
            println!("✓ Authorized {} for {} ({})", student_id, date, id);
            Ok(true)
        }

        Commands::Authorizations { date } => {
            let date = date.unwrap_or(today);
            let authorizations = desk.authorizations.for_date(date);
            for auth in &authorizations {
                let name = desk
                    .roster
                    .get(&auth.student_id)
                    .map_or("N/A", |s| s.name.as_str());
                println!("{}  {:<30} {}", auth.id, name, auth.note);
            }
            println!("\n{} authorizations on {}", authorizations.len(), date);
            Ok(false)
        }

        Commands::Unauthorize { authorization_id } => {
            if !desk.authorizations.delete(&authorization_id) {
                bail!("Unknown authorization: {}", authorization_id);
            }
            println!("✓ Authorization {} removed", authorization_id);
            Ok(true)
        }

        Commands::Checkin { student_id, accept_fallback, .. } => {
            match desk.check_in(&student_id)? {
                CheckinOutcome::Recorded(record) => {
                    println!(
                        "✓ {} checked in: {} as {} ({})",
                        student_id, record.meal, record.membership_at_checkin, record.id
                    );
                    Ok(true)
                }
                CheckinOutcome::NeedsConfirmation(request) if accept_fallback => {
                    let record = desk.confirm(request)?;
                    println!(
                        "✓ {} checked in: {} as {} ({})",
                        student_id, record.meal, record.membership_at_checkin, record.id
                    );
                    Ok(true)
                }
                CheckinOutcome::NeedsConfirmation(request) => {
                    warn!(student_id = %student_id, "check-in left unconfirmed");
                    println!("⚠️  {}", request.message());
                    println!("   Nothing recorded. Re-run with --accept-fallback to confirm.");
                    Ok(false)
                }
            }
        }

        Commands::Invalidate { checkin_id, reason } => {
            desk.invalidate(&checkin_id, &reason)?;
            println!("✓ Check-in {} invalidated", checkin_id);
            Ok(true)
        }

        Commands::Correct { checkin_id, membership, reason } => {
            let record = desk.correct_membership(&checkin_id, membership, &reason)?;
            println!(
                "✓ Check-in {} now counted as {}",
                record.id, record.membership_at_checkin
            );
            Ok(true)
        }

        Commands::Cancel { student_id, reason, end } => {
            let student = desk.cancel_contract(&student_id, end.unwrap_or(today), &reason)?;
            println!("✓ Contract of {} cancelled", student.name);
            Ok(true)
        }

        Commands::Report { kind } => {
            report(kind, desk, config, today)?;
            Ok(false)
        }

        Commands::History { date, export } => {
            let date = date.unwrap_or(today);
            let records = desk.store.history(date);
            export_history(std::io::stdout(), &records, &desk.roster)?;
            if export {
                let path = config.export_dir.join(format!("history_{}.csv", date));
                export_to_file(&path, |file| export_history(file, &records, &desk.roster))?;
                println!("\n✓ Exported to {}", path.display());
            }
            Ok(false)
        }

        Commands::ClearCheckins { yes } => {
            if !yes {
                bail!("Refusing to delete every check-in without --yes");
            }
            let removed = desk.store.clear();
            println!("✓ Removed {} check-ins", removed);
            Ok(true)
        }
    }
}

fn report(
    kind: ReportKind,
    desk: &CheckinDesk<FixedClock>,
    config: &AppConfig,
    today: NaiveDate,
) -> Result<()> {
    match kind {
        ReportKind::Daily { date, export } => {
            let date = date.unwrap_or(today);
            let report = desk.daily_report(date);
            println!("{}", report.summary());
            if export {
                let path = config.export_dir.join(format!("daily_report_{}.csv", date));
                export_to_file(&path, |file| export_daily(file, &report))?;
                println!("\n✓ Exported to {}", path.display());
            }
        }

        ReportKind::Monthly { year, month, membership, export } => {
            if !(1..=12).contains(&month) {
                bail!("Month must be between 1 and 12, got {}", month);
            }
            let report = desk.monthly_report(year, month);
            let selected: Vec<Membership> = match membership {
                Some(m) => vec![m],
                None => Membership::ALL.to_vec(),
            };

            for membership in selected {
                let count = report.entries(membership).len();
                println!("\n{} ({} students)", membership.label(), count);
                export_monthly(std::io::stdout(), &report, membership)?;
                if export {
                    let path = config.export_dir.join(format!(
                        "monthly_report_{}_{}-{:02}.csv",
                        membership.as_str(),
                        year,
                        month
                    ));
                    export_to_file(&path, |file| export_monthly(file, &report, membership))?;
                    println!("✓ Exported to {}", path.display());
                }
            }
        }

        ReportKind::Cancelled { export } => {
            let students = desk.roster.cancelled();
            export_cancelled(std::io::stdout(), &students)?;
            if export {
                let path = config
                    .export_dir
                    .join(format!("cancelled_students_{}.csv", today));
                export_to_file(&path, |file| export_cancelled(file, &students))?;
                println!("\n✓ Exported to {}", path.display());
            }
        }
    }
    Ok(())
}
