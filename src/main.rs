mod ai;
mod calendar;
mod config;
mod db;
mod dedup;
mod errors;
mod materials;
mod models;
mod normalize;
mod pipeline;
mod prep;
mod reminders;
mod sheets;
mod sources;
mod tracker;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use db::Database;
use errors::IngestError;
use models::{NormalizedJob, Status};
use pipeline::{IngestionReport, Pipeline};
use sources::FetchParams;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracker::Tracker;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Internship scout - aggregate postings, track applications, draft materials")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Sheets,
}

#[derive(Clone, Copy, ValueEnum)]
enum CalendarKind {
    Google,
    Ics,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Fetch postings from every configured source and record new ones
    Fetch {
        /// Search query passed to each source
        #[arg(short, long, default_value = sources::DEFAULT_QUERY)]
        query: String,

        /// Location filter
        #[arg(short, long)]
        location: Option<String>,

        /// Only run sources whose tag starts with this (simplify, rss, scraper:amazon)
        #[arg(long)]
        only: Option<String>,

        /// Where new postings are recorded
        #[arg(short, long, value_enum, default_value = "local")]
        backend: Backend,

        /// Show what would be added without adding
        #[arg(long)]
        dry_run: bool,

        /// Print added postings as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tracked jobs
    List {
        /// Filter by status (new, interested, applied, interview, offer, rejected)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by company
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Update a job's application status
    Status {
        /// Job ID
        id: i64,

        /// New status
        status: String,
    },

    /// Draft tailored resume bullets and a cover letter for a job
    Draft {
        /// Job ID
        id: i64,

        /// File with base resume bullets, one per line
        #[arg(short, long)]
        bullets: PathBuf,

        /// File with the full job description
        #[arg(short, long)]
        description: Option<PathBuf>,

        /// Model to use (gpt-4o-mini, gpt-4o, gpt-4.1, api-sonnet, api-haiku, draft)
        #[arg(short, long, default_value = ai::DEFAULT_MODEL)]
        model: String,

        /// Directory for the generated files
        #[arg(short, long, default_value = "drafts")]
        out_dir: PathBuf,
    },

    /// Put upcoming deadlines on a calendar
    Remind {
        /// Look this many days ahead
        #[arg(short, long, default_value = "7")]
        days: i64,

        /// Calendar to write to
        #[arg(short, long, value_enum, default_value = "google")]
        calendar: CalendarKind,

        /// Output file for the ics calendar
        #[arg(long, default_value = "deadlines.ics")]
        ics_file: PathBuf,
    },

    /// Print reminders for upcoming deadlines
    Deadlines {
        /// Look this many days ahead
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Ask a random interview question
    Prep {
        /// Question domain (arrays, graphs, behavioral)
        #[arg(default_value = prep::DEFAULT_DOMAIN)]
        domain: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}=info", env!("CARGO_PKG_NAME")))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    run(cli.command, &config)
}

fn run(command: Commands, config: &Config) -> Result<()> {
    // Only commands that read or write the local store create it.
    let open_db = || Database::open(&config.database_path);

    match command {
        Commands::Init => {
            let db = open_db()?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Fetch {
            query,
            location,
            only,
            backend,
            dry_run,
            json,
        } => {
            let mut adapters = sources::configured(config)?;
            if let Some(prefix) = &only {
                adapters = sources::only(adapters, prefix);
            }
            let pipeline = Pipeline::new(adapters);
            let params = FetchParams { query, location };

            let local_db;
            let sheets_tracker;
            let tracker: &dyn Tracker = match backend {
                Backend::Local => {
                    let db = open_db()?;
                    db.ensure_initialized()?;
                    local_db = db;
                    &local_db
                }
                Backend::Sheets => {
                    let client = sources::http_client(config.http_timeout)?;
                    let sheets = sheets::SheetsTracker::from_config(config, client)?;
                    sheets.ensure_sheet()?;
                    sheets_tracker = sheets;
                    &sheets_tracker
                }
            };
            let known_keys = tracker.known_identity_keys()?;
            info!(known = known_keys.len(), "Loaded tracked identity keys");

            if dry_run {
                let plan = report_ingest_error(pipeline.plan(&params, known_keys))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&plan.to_add)?);
                } else {
                    print_jobs(&plan.to_add);
                    println!("\nResults:");
                    println!("  Fetched:      {}", plan.fetched);
                    println!("  Would add:    {}", plan.to_add.len());
                    println!("  Duplicates:   {}", plan.skipped_duplicates);
                    for (tag, error) in &plan.per_source_errors {
                        println!("  Failed:       {} ({})", tag, error);
                    }
                    println!("\n(Dry run - no jobs were actually added)");
                }
            } else {
                let report = report_ingest_error(pipeline.run(&params, known_keys, tracker))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report.added)?);
                } else {
                    print_report(&report);
                }
            }
        }

        Commands::List { status, company } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            let status = status.map(|s| s.parse::<Status>()).transpose()?;
            let jobs = db.list_jobs(status, company.as_deref())?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<6} {:<13} {:<30} {:<20} {:<11} {:<16}",
                    "ID", "STATUS", "ROLE", "COMPANY", "DEADLINE", "SOURCE"
                );
                println!("{}", "-".repeat(101));
                for tracked in jobs {
                    let job = &tracked.job;
                    let deadline = job
                        .deadline
                        .map(|d| d.date().format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<6} {:<13} {:<30} {:<20} {:<11} {:<16}",
                        tracked.id,
                        job.status,
                        truncate(&job.role, 28),
                        truncate(&job.company, 18),
                        deadline,
                        truncate(&job.source.to_string(), 16)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            match db.get_job(id)? {
                Some(tracked) => {
                    let job = &tracked.job;
                    println!("Job #{}", tracked.id);
                    println!("Role: {}", job.role);
                    println!("Company: {}", job.company);
                    if !job.location.is_empty() {
                        println!("Location: {}", job.location);
                    }
                    println!("Status: {}", job.status);
                    if let Some(deadline) = &job.deadline {
                        println!("Deadline: {}", deadline);
                    }
                    println!("Apply: {}", job.apply_link);
                    println!("Source: {}", job.source);
                    println!("Added: {}", job.added_at.to_rfc3339());
                    println!("Updated: {}", tracked.updated_at);
                    if let Some(path) = &tracked.resume_file {
                        println!("Resume: {}", path);
                    }
                    if let Some(path) = &tracked.cover_letter_file {
                        println!("Cover letter: {}", path);
                    }
                    if let Some(event) = &tracked.reminder_event {
                        println!("Reminder: {}", event);
                    }
                    if !job.notes.is_empty() {
                        println!("\n--- Notes ---\n{}", textwrap::fill(&job.notes, 80));
                    }
                }
                None => {
                    println!("Job #{} not found.", id);
                }
            }
        }

        Commands::Status { id, status } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            let status: Status = status.parse()?;
            if db.set_status(id, status)? {
                println!("Job #{} marked as {}.", id, status);
            } else {
                println!("Job #{} not found.", id);
            }
        }

        Commands::Draft {
            id,
            bullets,
            description,
            model,
            out_dir,
        } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            let tracked = db
                .get_job(id)?
                .ok_or_else(|| anyhow!("Job #{} not found", id))?;

            let base_bullets = materials::read_bullets(&bullets)?;
            let job_desc = match &description {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read job description: {}", path.display()))?,
                None if !tracked.job.notes.is_empty() => tracked.job.notes.clone(),
                None => tracked.job.role.clone(),
            };

            let spec = ai::resolve_model(&model)?;
            let llm = ai::create_provider(&spec, sources::http_client(config.http_timeout)?)?;
            println!("Drafting materials for job #{} with {} ({})...", id, spec.short_name, llm.model_name());

            let drafted = materials::draft_for_job(llm.as_ref(), &tracked, &job_desc, &base_bullets, &out_dir)?;
            db.set_material_files(
                id,
                &drafted.resume_file.to_string_lossy(),
                &drafted.cover_letter_file.to_string_lossy(),
            )?;

            if drafted.bullets.is_empty() {
                println!("\nNo bullets returned by {}.", llm.model_name());
            } else {
                println!("\n--- Resume Bullets ---");
                for bullet in &drafted.bullets {
                    println!("{}", textwrap::fill(&format!("- {}", bullet), 80));
                }
            }
            println!("\n--- Cover Letter ---\n{}", textwrap::fill(&drafted.cover_letter, 80));
            println!("\nResume saved to: {}", drafted.resume_file.display());
            println!("Cover letter saved to: {}", drafted.cover_letter_file.display());
        }

        Commands::Remind {
            days,
            calendar,
            ics_file,
        } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            let target: Box<dyn calendar::Calendar> = match calendar {
                CalendarKind::Google => {
                    let token = config
                        .google_access_token
                        .as_deref()
                        .ok_or_else(|| anyhow!("GOOGLE_ACCESS_TOKEN must be set to use the Google calendar"))?;
                    let client = sources::http_client(config.http_timeout)?;
                    Box::new(calendar::GoogleCalendar::new(client, &config.calendar_id, token))
                }
                CalendarKind::Ics => Box::new(calendar::IcsCalendar::new(&ics_file)),
            };

            let today = Utc::now().date_naive();
            let stats = reminders::schedule_reminders(&db, target.as_ref(), today, days)?;

            println!("\nResults:");
            println!("  Scheduled:         {}", stats.scheduled);
            println!("  Already scheduled: {}", stats.already_scheduled);
            if stats.errors > 0 {
                println!("  Errors:            {}", stats.errors);
            }
            if matches!(calendar, CalendarKind::Ics) && stats.scheduled > 0 {
                println!("\nImport {} into your calendar app.", ics_file.display());
            }
        }

        Commands::Deadlines { days } => {
            let db = open_db()?;
            db.ensure_initialized()?;
            let today = Utc::now().date_naive();
            let jobs = db.jobs_with_deadlines()?;
            let upcoming = reminders::upcoming(&jobs, today, days);
            if upcoming.is_empty() {
                println!("No deadlines in the next {} days.", days);
            } else {
                reminders::notify(upcoming.iter().map(|t| reminders::reminder_message(t, today)));
            }
        }

        Commands::Prep { domain } => {
            let (resolved, question) = prep::ask_random(&domain);
            if resolved != domain.trim().to_lowercase() {
                println!("(using '{}' questions)", resolved);
            }
            println!("[{}] {}", resolved, question);
        }
    }

    Ok(())
}

/// Print every failed source before surfacing a run-level failure.
fn report_ingest_error<T>(result: Result<T, IngestError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(IngestError::AllSourcesFailed(errors)) => {
            for (tag, error) in &errors {
                eprintln!("  {}: {}", tag, error);
            }
            Err(IngestError::AllSourcesFailed(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_jobs(jobs: &[NormalizedJob]) {
    if jobs.is_empty() {
        return;
    }
    println!("{:<30} {:<20} {:<20} {:<16}", "ROLE", "COMPANY", "LOCATION", "SOURCE");
    println!("{}", "-".repeat(89));
    for job in jobs {
        println!(
            "{:<30} {:<20} {:<20} {:<16}",
            truncate(&job.role, 28),
            truncate(&job.company, 18),
            truncate(&job.location, 18),
            truncate(&job.source.to_string(), 16)
        );
    }
}

fn print_report(report: &IngestionReport) {
    print_jobs(&report.added);

    println!("\nResults:");
    println!("  Fetched:      {}", report.fetched);
    println!("  Jobs added:   {}", report.added.len());
    println!("  Duplicates:   {}", report.skipped_duplicates);
    if !report.normalization_errors.is_empty() {
        println!("  Dropped:      {}", report.normalization_errors.len());
    }
    for (tag, error) in &report.per_source_errors {
        println!("  Failed:       {} ({})", tag, error);
    }
    for (job, error) in &report.persistence_errors {
        println!("  Not saved:    {} @ {} ({})", job.role, job.company, error);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Acme", 10), "Acme");
        assert_eq!(truncate("Software Engineering Intern", 12), "Software ...");
        assert_eq!(truncate("Développeur stagiaire", 8), "Dével...");
    }

    #[test]
    fn test_cli_parses_fetch_flags() {
        let cli = Cli::try_parse_from([
            "scout", "fetch", "--only", "rss", "--backend", "sheets", "--dry-run", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch {
                query,
                only,
                backend,
                dry_run,
                json,
                ..
            } => {
                assert_eq!(query, sources::DEFAULT_QUERY);
                assert_eq!(only.as_deref(), Some("rss"));
                assert!(matches!(backend, Backend::Sheets));
                assert!(dry_run && json);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_cli_parses_remind_defaults() {
        let cli = Cli::try_parse_from(["scout", "remind", "--calendar", "ics"]).unwrap();
        match cli.command {
            Commands::Remind { days, calendar, ics_file } => {
                assert_eq!(days, 7);
                assert!(matches!(calendar, CalendarKind::Ics));
                assert_eq!(ics_file, PathBuf::from("deadlines.ics"));
            }
            _ => panic!("expected remind"),
        }
    }

    #[test]
    fn test_commands_without_local_store_do_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config = Config {
            database_path: data_dir.join("scout.db"),
            ..Config::default()
        };

        run(Commands::Prep { domain: "graphs".to_string() }, &config).unwrap();
        assert!(!data_dir.exists());

        let cli = Cli::try_parse_from(["scout", "fetch", "--backend", "sheets"]).unwrap();
        assert!(run(cli.command, &config).is_err());
        assert!(!data_dir.exists());

        run(Commands::Init, &config).unwrap();
        assert!(data_dir.join("scout.db").exists());
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["scout", "fetch", "--backend", "excel"]).is_err());
    }
}
