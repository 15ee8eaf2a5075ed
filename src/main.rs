use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::PathBuf;

use rollcall::config::Config;
use rollcall::db::Database;
use rollcall::engine::{AttendanceEngine, Outcome};
use rollcall::report::{self, ReportPeriod};
use rollcall::{logging, sweeper};

struct Cli {
    config_path: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("rollcall {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            arg => command.push(arg.to_string()),
        }
        i += 1;
    }

    Cli {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"rollcall - attendance recording and deduplication core

USAGE:
    rollcall [OPTIONS] <COMMAND>

COMMANDS:
    init                                    Create the database schema
    register <user_id> <name>               Register a user (corrects the name if it changed)
    record <user_id> <confidence> [--at TS] Record a recognition event
    history <user_id> [--start TS] [--end TS]
                                            Attendance history, most recent first
    users                                   List registered users, ordered by name
    stats                                   Today's/weekly counts and attendance rate
    patterns <user_id>                      Weekday distribution and mean arrival hour
    report [month|week|all]                 Present/late/absent report with per-day trends
    recent [LIMIT]                          Latest records with names and status
    sweep [--user ID --at TS]               Remove near-duplicate records; scoped when
                                            both --user and --at are given
    cleanup-user <user_id>                  Delete a user and all their records

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

Timestamps are accepted as RFC 3339 or "YYYY-MM-DDTHH:MM:SS" (treated as UTC).

ENVIRONMENT:
    ROLLCALL_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/rollcall/config.toml"#
    );
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|_| anyhow!("invalid timestamp '{value}'"))
}

/// Pull the value of `--flag value` out of an argument list, if present.
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        if pos + 1 >= args.len() {
            bail!("{flag} requires a value");
        }
        let value = args.remove(pos + 1);
        args.remove(pos);
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args();

    // A CLI run should still work when logging cannot be set up.
    let _log_guard = logging::init(&Config::config_dir().join("logs"))
        .ok()
        .flatten();

    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.db_path)?;
    db.initialize()?;

    let mut args = cli.command;
    if args.is_empty() {
        print_help();
        std::process::exit(1);
    }
    let command = args.remove(0);

    match command.as_str() {
        "init" => {
            // Schema is applied above on every invocation; this just reports.
            println!("database ready at {}", config.db_path.display());
        }
        "register" => {
            let user_id = parse_user_id(args.first())?;
            let name = args.get(1).ok_or_else(|| anyhow!("register requires a name"))?;
            db.register_user(user_id, name)?;
            println!("registered user {user_id} ({name})");
        }
        "record" => {
            let at = take_flag(&mut args, "--at")?
                .map(|v| parse_timestamp(&v))
                .transpose()?;
            let user_id = parse_user_id(args.first())?;
            let confidence: f64 = args
                .get(1)
                .ok_or_else(|| anyhow!("record requires a confidence"))?
                .parse()
                .context("confidence must be a number in [0, 1]")?;

            let engine = AttendanceEngine::new(db, config.attendance.clone());
            match engine.record_attendance(user_id, confidence, at)? {
                Outcome::Accepted => println!("attendance recorded for user {user_id}"),
                Outcome::Skipped => {
                    println!("user {user_id} already marked present today, skipped")
                }
            }
        }
        "history" => {
            let start = take_flag(&mut args, "--start")?
                .map(|v| parse_timestamp(&v))
                .transpose()?;
            let end = take_flag(&mut args, "--end")?
                .map(|v| parse_timestamp(&v))
                .transpose()?;
            let user_id = parse_user_id(args.first())?;
            let history = db.history(user_id, start, end)?;
            print_json(&history)?;
        }
        "users" => {
            print_json(&db.list_users()?)?;
        }
        "stats" => {
            let engine = AttendanceEngine::new(db, config.attendance.clone());
            print_json(&engine.statistics()?)?;
        }
        "patterns" => {
            let user_id = parse_user_id(args.first())?;
            let engine = AttendanceEngine::new(db, config.attendance.clone());
            print_json(&engine.user_patterns(user_id)?)?;
        }
        "report" => {
            let period = match args.first().map(String::as_str) {
                None => ReportPeriod::Month,
                Some(value) => ReportPeriod::from_str(value)
                    .ok_or_else(|| anyhow!("unknown period '{value}' (month|week|all)"))?,
            };
            let report =
                report::attendance_report(&db, &config.attendance, Utc::now(), period)?;
            print_json(&report)?;
        }
        "recent" => {
            let limit: usize = match args.first() {
                Some(value) => value.parse().context("limit must be a positive integer")?,
                None => 10,
            };
            let recent = report::recent_attendance(&db, &config.attendance, limit)?;
            print_json(&recent)?;
        }
        "sweep" => {
            let user = take_flag(&mut args, "--user")?
                .map(|v| v.parse::<i64>().context("--user must be an integer id"))
                .transpose()?;
            let at = take_flag(&mut args, "--at")?
                .map(|v| parse_timestamp(&v))
                .transpose()?;
            let deleted = match (user, at) {
                (Some(user_id), Some(reference)) => sweeper::sweep_user_window(
                    &db,
                    user_id,
                    reference,
                    config.attendance.window_minutes,
                )?,
                (None, None) => {
                    sweeper::sweep_duplicates(&db, config.attendance.window_minutes)?
                }
                _ => bail!("scoped sweep requires both --user and --at"),
            };
            println!("deleted {deleted} duplicate record(s)");
        }
        "cleanup-user" => {
            let user_id = parse_user_id(args.first())?;
            let records = db.delete_user(user_id)?;
            println!("deleted user {user_id} and {records} attendance record(s)");
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_user_id(arg: Option<&String>) -> Result<i64> {
    arg.ok_or_else(|| anyhow!("missing user id"))?
        .parse()
        .context("user id must be an integer")
}
