//! `contact` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments into typed values and dispatch to `ContactService`.
//! - Print human-readable results; contact logic stays in `contact_book_core`.
//!
//! # Invariants
//! - One connection is opened per process and injected into the repository.
//! - Conflicts, missing contacts and empty updates are reported on stdout and
//!   exit successfully; storage and remote failures exit with status 1.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use contact_book_core::backup::{DEFAULT_REMOTE_PATH, DEFAULT_TOKEN_FILE};
use contact_book_core::db::open_db;
use contact_book_core::{
    backup_database, birthday_from_age, default_log_level, init_logging, parse_birthday,
    resolve_token, returned_line, Contact, ContactKey, ContactPatch, ContactService,
    DropboxUploader, ResetOutcome, ServiceError, ShowQuery, SqliteContactRepository,
};
use dialoguer::Confirm;
use log::error;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliService<'conn> = ContactService<SqliteContactRepository<'conn>>;

const RESET_PROMPT: &str = "Do you want to reset the contact book? All contacts will be lost!";

#[derive(Parser)]
#[command(name = "contact", about = "A small contact book kept in a local SQLite file", version)]
struct Cli {
    /// Contact book database file
    #[arg(long, global = true, env = "CONTACT_BOOK_DB", default_value = "contact_book.db")]
    db: PathBuf,
    /// Directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "CONTACT_BOOK_LOG_DIR")]
    log_dir: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CONTACT_BOOK_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the database. Caution: all your contacts will be lost!
    Reset(ResetArgs),
    /// Add a new contact
    New(NewArgs),
    /// Show contacts, optionally filtered by name and surname
    Show(ShowArgs),
    /// Change phone, email or birthday of an existing contact
    Update(UpdateArgs),
    /// Delete a contact
    Delete(KeyArgs),
    /// Upload the database file to Dropbox
    Backup(BackupArgs),
}

#[derive(Args)]
struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct NewArgs {
    name: String,
    surname: String,
    phone: String,
    #[arg(long)]
    email: Option<String>,
    /// Birthday as DD-MM-YYYY or YYYY-MM-DD
    #[arg(long, value_parser = parse_birthday, conflicts_with = "age")]
    birthday: Option<NaiveDate>,
    /// Age in years, stored as an approximate birthday
    #[arg(long)]
    age: Option<u32>,
}

#[derive(Args)]
struct ShowArgs {
    /// Show all the columns in the table
    #[arg(long)]
    all: bool,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    surname: Option<String>,
    /// Match name and surname as substrings
    #[arg(long)]
    find: bool,
}

#[derive(Args)]
struct UpdateArgs {
    name: String,
    surname: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Birthday as DD-MM-YYYY or YYYY-MM-DD
    #[arg(long, value_parser = parse_birthday)]
    birthday: Option<NaiveDate>,
}

#[derive(Args)]
struct KeyArgs {
    name: String,
    surname: String,
}

#[derive(Args)]
struct BackupArgs {
    /// Dropbox access token; read from --token-file when omitted
    #[arg(long)]
    token: Option<String>,
    #[arg(long, env = "CONTACT_BOOK_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    token_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=command module=cli status=error error={err}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)
            .map_err(|message| anyhow!(message))
            .context("cannot start logging")?;
    }

    let db_path = cli.db;
    match cli.command {
        Commands::Reset(args) => with_service(&db_path, |service| run_reset(service, &args)),
        Commands::New(args) => with_service(&db_path, |service| run_new(service, args)),
        Commands::Show(args) => with_service(&db_path, |service| run_show(service, args)),
        Commands::Update(args) => with_service(&db_path, |service| run_update(service, args)),
        Commands::Delete(args) => with_service(&db_path, |service| run_delete(service, &args)),
        Commands::Backup(args) => run_backup(&db_path, &args),
    }
}

/// Opens the store at `db_path` and runs `command` against it.
fn with_service(
    db_path: &Path,
    command: impl FnOnce(&CliService<'_>) -> Result<()>,
) -> Result<()> {
    let conn = open_db(db_path)
        .with_context(|| format!("cannot open contact book `{}`", db_path.display()))?;
    let repo = SqliteContactRepository::try_new(&conn)?;
    command(&ContactService::new(repo))
}

fn run_reset(service: &CliService<'_>, args: &ResetArgs) -> Result<()> {
    let confirmed = args.yes || confirm_reset()?;

    match service.reset(confirmed)? {
        ResetOutcome::Reset => println!("The contact book has been reset"),
        ResetOutcome::Cancelled => println!("Reset cancelled, no contacts were removed"),
    }
    Ok(())
}

/// Asks for reset confirmation on the terminal, or reads one answer line
/// from piped stdin.
fn confirm_reset() -> Result<bool> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Confirm::new()
            .with_prompt(RESET_PROMPT)
            .default(false)
            .interact()
            .context("cannot read reset confirmation; pass --yes to skip the prompt");
    }

    println!("{RESET_PROMPT} [y/N]");
    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("cannot read reset confirmation; pass --yes to skip the prompt")?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn run_new(service: &CliService<'_>, args: NewArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let mut contact = Contact::new(&args.name, &args.surname, args.phone);
    contact.email = args.email;
    contact.birthday = match (args.birthday, args.age) {
        (Some(birthday), _) => Some(birthday),
        (None, Some(age)) => Some(
            birthday_from_age(i64::from(age), today)
                .ok_or_else(|| anyhow!("age {age} is out of range"))?,
        ),
        (None, None) => None,
    };

    match service.create(contact) {
        Ok(created) => {
            println!("You added this contact:");
            println!("{}", created.card(today));
            Ok(())
        }
        Err(err) => report_or_fail(err),
    }
}

fn run_show(service: &CliService<'_>, args: ShowArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let query = ShowQuery {
        all: args.all,
        name: args.name,
        surname: args.surname,
        find: args.find,
    };

    let contacts = service.show(&query)?;
    for contact in &contacts {
        println!("{}", contact.card(today));
    }
    println!("{}", returned_line(contacts.len()));
    Ok(())
}

fn run_update(service: &CliService<'_>, args: UpdateArgs) -> Result<()> {
    let key = ContactKey::new(&args.name, &args.surname);
    let patch = ContactPatch {
        phone: args.phone,
        email: args.email,
        birthday: args.birthday,
    };

    match service.update(&key, &patch) {
        Ok(changed) => {
            println!("Updated {key}: {changed} row(s) affected");
            Ok(())
        }
        Err(err) => report_or_fail(err),
    }
}

fn run_delete(service: &CliService<'_>, args: &KeyArgs) -> Result<()> {
    let key = ContactKey::new(&args.name, &args.surname);
    match service.delete(&key) {
        Ok(_) => {
            println!("Deleted {key} from your contacts");
            Ok(())
        }
        Err(err) => report_or_fail(err),
    }
}

fn run_backup(db_path: &Path, args: &BackupArgs) -> Result<()> {
    let token = resolve_token(args.token.as_deref(), &args.token_file)?;
    let uploader = DropboxUploader::new(token)?;
    let bytes = backup_database(db_path, &uploader)
        .with_context(|| format!("backup of `{}` failed", db_path.display()))?;
    println!("Uploaded {bytes} bytes to Dropbox at {DEFAULT_REMOTE_PATH}");
    Ok(())
}

/// Prints command-level refusals; passes store failures up.
fn report_or_fail(err: ServiceError) -> Result<()> {
    match err {
        ServiceError::Conflict(key) => {
            println!("{key} is already in your contacts; nothing was added");
            Ok(())
        }
        ServiceError::NotFound(key) => {
            println!("{key} is not in your contacts");
            Ok(())
        }
        ServiceError::NothingToUpdate => {
            println!("Nothing to update: pass at least one of --phone, --email or --birthday");
            Ok(())
        }
        ServiceError::Repo(err) => Err(err.into()),
    }
}
