mod password;

use std::fmt;
use std::path::PathBuf;

use quest_core::grader::{BLOCK_DELIMITER, SubmissionForm};
use quest_core::model::{LevelId, RegistrationDraft, TaskKind, UserId};
use quest_core::unlock::{LevelSummary, NextStep};
use services::{
    AppServices, Clock, TaskAccess, TaskOutcome, TaskView, UserServiceError, load_catalog,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidLevel { raw: String },
    InvalidIdx { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidLevel { raw } => write!(f, "invalid --level value: {raw}"),
            ArgsError::InvalidIdx { raw } => write!(f, "invalid --idx value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quest levels        --user <id> [--db <sqlite_url>] [--catalog <path>]");
    eprintln!("  quest task          --user <id> --level <n> --idx <i>");
    eprintln!("  quest submit        --user <id> --level <n> --idx <i>");
    eprintln!("                      [--choice <index>] [--block <A||B||C>] [--fillin <text>]");
    eprintln!("  quest register      --username <name> --password <pw> --confirm <pw>");
    eprintln!("  quest login         --username <name> --password <pw>");
    eprintln!("  quest check-catalog [--catalog <path>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:data.db");
    eprintln!("  --catalog tasks/levels.json");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUEST_DB_URL, QUEST_CATALOG, QUEST_USER_ID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Levels,
    Task,
    Submit,
    Register,
    Login,
    CheckCatalog,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "levels" => Some(Self::Levels),
            "task" => Some(Self::Task),
            "submit" => Some(Self::Submit),
            "register" => Some(Self::Register),
            "login" => Some(Self::Login),
            "check-catalog" => Some(Self::CheckCatalog),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    catalog: PathBuf,
    user_id: Option<UserId>,
    level: Option<LevelId>,
    idx: Option<usize>,
    form: SubmissionForm,
    username: Option<String>,
    password: Option<String>,
    confirm: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUEST_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:data.db".into()), normalize_sqlite_url);
        let mut catalog = std::env::var("QUEST_CATALOG")
            .map_or_else(|_| PathBuf::from("tasks/levels.json"), PathBuf::from);
        let mut user_id = std::env::var("QUEST_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        let mut level = None;
        let mut idx = None;
        let mut form = SubmissionForm::default();
        let mut username = None;
        let mut password = None;
        let mut confirm = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => catalog = PathBuf::from(require_value(args, "--catalog")?),
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--level" => {
                    let value = require_value(args, "--level")?;
                    let parsed = value
                        .parse::<LevelId>()
                        .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?;
                    level = Some(parsed);
                }
                "--idx" => {
                    let value = require_value(args, "--idx")?;
                    let parsed: usize = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidIdx { raw: value.clone() })?;
                    idx = Some(parsed);
                }
                // Answer fields stay raw; the grader decides what they mean.
                "--choice" => form.choice = Some(require_value(args, "--choice")?),
                "--block" => form.block = Some(require_value(args, "--block")?),
                "--fillin" => form.fillin = Some(require_value(args, "--fillin")?),
                "--username" => username = Some(require_value(args, "--username")?),
                "--password" => password = Some(require_value(args, "--password")?),
                "--confirm" => confirm = Some(require_value(args, "--confirm")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            catalog,
            user_id,
            level,
            idx,
            form,
            username,
            password,
            confirm,
        })
    }

    fn user(&self) -> Result<UserId, ArgsError> {
        self.user_id.ok_or(ArgsError::MissingFlag { flag: "--user" })
    }

    fn task_ref(&self) -> Result<(LevelId, usize), ArgsError> {
        let level = self.level.ok_or(ArgsError::MissingFlag { flag: "--level" })?;
        let idx = self.idx.ok_or(ArgsError::MissingFlag { flag: "--idx" })?;
        Ok((level, idx))
    }

    fn credentials(&self) -> Result<(&str, &str), ArgsError> {
        let username = self
            .username
            .as_deref()
            .ok_or(ArgsError::MissingFlag { flag: "--username" })?;
        let password = self
            .password
            .as_deref()
            .ok_or(ArgsError::MissingFlag { flag: "--password" })?;
        Ok((username, password))
    }

    /// Missing fields are left empty so the registration rules report them.
    fn registration(&self) -> RegistrationDraft {
        RegistrationDraft::new(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
            self.confirm.clone().unwrap_or_default(),
        )
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_levels(levels: &[LevelSummary]) {
    for level in levels {
        let marker = if !level.unlocked {
            "locked"
        } else if level.is_complete() {
            "done"
        } else {
            "open"
        };
        println!(
            "{:>3}. {:<30} {}/{} [{marker}]",
            level.id.value(),
            level.title,
            level.done,
            level.total
        );
    }
}

fn print_task(view: &TaskView) {
    println!(
        "Level {} \u{ab}{}\u{bb}, task {}/{} ({})",
        view.level,
        view.level_title,
        view.idx + 1,
        view.total,
        view.state.as_str()
    );
    if let Some(video) = view.task.video() {
        println!("video: {video}");
    }
    match view.task.kind() {
        TaskKind::Mcq { choices, .. } => {
            println!("Pick one (--choice <index>):");
            for (i, choice) in choices.iter().enumerate() {
                println!("  [{i}] {choice}");
            }
        }
        TaskKind::Ordering { blocks, .. } => {
            println!("Arrange the blocks (--block joined with {BLOCK_DELIMITER}):");
            for text in blocks.values() {
                println!("  {text}");
            }
        }
        TaskKind::Fill { .. } => println!("Type your answer (--fillin <text>)."),
        TaskKind::Unsupported { kind } => println!("Unsupported task type: {kind}"),
    }
}

fn print_outcome(outcome: &TaskOutcome, level: LevelId) {
    println!("{}", outcome.feedback().message());
    if let TaskOutcome::Graded { next, .. } = outcome {
        match next {
            NextStep::Advance(next_idx) => {
                println!("next: quest task --level {level} --idx {next_idx}");
            }
            NextStep::LevelComplete => println!("Level {level} complete. Back to: quest levels"),
            NextStep::Retry => {}
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if cmd == Command::CheckCatalog {
        let catalog = load_catalog(&parsed.catalog)?;
        for (id, level) in catalog.levels() {
            println!(
                "{:>3}. {} ({} tasks)",
                id.value(),
                level.title(),
                level.task_count()
            );
        }
        return Ok(());
    }

    tracing::debug!(
        ?cmd,
        db = %parsed.db_url,
        catalog = %parsed.catalog.display(),
        "starting"
    );

    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, &parsed.catalog, Clock::system()).await?;

    match cmd {
        Command::Register => {
            match services
                .users()
                .register(parsed.registration(), password::hash_password)
                .await
            {
                Ok(id) => println!("Registered user {}. Log in with: quest login", id.value()),
                Err(UserServiceError::Registration(err)) => println!("{err}"),
                Err(err) => return Err(err.into()),
            }
            return Ok(());
        }
        Command::Login => {
            let (username, secret) = parsed.credentials()?;
            match services
                .users()
                .authenticate(username, secret, password::verify_password)
                .await?
            {
                Some(id) => {
                    let id = id.value();
                    println!("Logged in. Use --user {id} or QUEST_USER_ID={id}");
                }
                None => println!("Invalid username or password."),
            }
            return Ok(());
        }
        _ => {}
    }

    // Identity comes from `quest login`; here it is a flag or env var.
    let user = parsed.user()?;

    match cmd {
        Command::Levels => {
            let levels = services.levels().list_levels(user).await?;
            print_levels(&levels);
        }
        Command::Task => {
            let (level, idx) = parsed.task_ref()?;
            match services.tasks().open_task(user, level, idx).await? {
                TaskAccess::Granted(view) => print_task(&view),
                TaskAccess::Locked => println!("Complete the previous level first."),
                TaskAccess::NotFound => println!("Task not found."),
            }
        }
        Command::Submit => {
            let (level, idx) = parsed.task_ref()?;
            let outcome = services
                .tasks()
                .submit(user, level, idx, &parsed.form)
                .await?;
            print_outcome(&outcome, level);
        }
        Command::Register | Command::Login | Command::CheckCatalog => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn parses_submission_flags() {
        let args = parse(&[
            "--user", "7", "--level", "2", "--idx", "0", "--block", "C||A||B", "--db",
            "sqlite::memory:",
        ])
        .unwrap();
        assert_eq!(args.user().unwrap(), UserId::new(7));
        assert_eq!(args.task_ref().unwrap(), (LevelId::new(2), 0));
        assert_eq!(args.form.block.as_deref(), Some("C||A||B"));
        assert_eq!(args.db_url, "sqlite::memory:");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--level", "x"]),
            Err(ArgsError::InvalidLevel { .. })
        ));
        assert!(matches!(
            parse(&["--idx"]),
            Err(ArgsError::MissingValue { flag: "--idx" })
        ));
        assert!(matches!(
            parse(&["--bogus"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn task_ref_requires_level_and_idx() {
        let args = parse(&["--level", "1", "--db", "sqlite::memory:"]).unwrap();
        assert!(matches!(
            args.task_ref(),
            Err(ArgsError::MissingFlag { flag: "--idx" })
        ));
    }

    #[test]
    fn credential_flags_feed_login_and_registration() {
        let args = parse(&[
            "--username", "alice", "--password", "secret1", "--confirm", "secret1",
        ])
        .unwrap();
        assert_eq!(args.credentials().unwrap(), ("alice", "secret1"));
        assert!(args.registration().validate().is_ok());

        let args = parse(&["--username", "alice"]).unwrap();
        assert!(matches!(
            args.credentials(),
            Err(ArgsError::MissingFlag { flag: "--password" })
        ));
    }

    #[test]
    fn normalizes_relative_sqlite_paths() {
        let url = normalize_sqlite_url("sqlite:data.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data.db"));
        assert_eq!(
            normalize_sqlite_url("sqlite://already.db".into()),
            "sqlite://already.db"
        );
    }
}
