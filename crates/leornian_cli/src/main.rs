//! Operator command line.
//!
//! # Responsibility
//! - Run maintenance tasks against the database named by `LEOR_DB_PATH`.
//! - Keep output plain and line-oriented for scripting.

use clap::{Args, Parser, Subcommand};
use leornian_core::db::open_db;
use leornian_core::repo::user_repo::SqliteUserRepository;
use leornian_core::service::export_service::ExportService;
use leornian_core::service::note_service::NoteService;
use leornian_core::service::user_service::UserService;
use leornian_core::{core_version, init_logging, NewUser, Settings};
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "leornian", about = "Leornian maintenance commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Create an account")]
    CreateUser(CreateUserArgs),

    #[command(about = "Delete deattribution records older than the given number of days")]
    RemoveOldDeattributions(RemoveOldDeattributionsArgs),

    #[command(about = "Write an account's collection archive to disk")]
    ExportUserData(ExportUserDataArgs),

    #[command(about = "Print the core library version")]
    Version,
}

#[derive(Args)]
struct CreateUserArgs {
    username: String,
    email: String,

    #[arg(long, help = "Grant moderator access")]
    staff: bool,
}

#[derive(Args)]
struct RemoveOldDeattributionsArgs {
    num_days: i64,
}

#[derive(Args)]
struct ExportUserDataArgs {
    username: String,

    #[arg(long, short, help = "Archive path (defaults to the generated file name)")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("leornian: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), String> {
    if let Command::Version = command {
        println!("leornian {}", core_version());
        return Ok(());
    }

    let settings = Settings::from_env().map_err(|err| err.to_string())?;
    init_logging(&settings.log_level, &settings.log_dir).map_err(|err| err.to_string())?;
    let mut conn = open_db(&settings.db_path).map_err(|err| err.to_string())?;

    match command {
        Command::Migrate => {
            info!("event=cli_migrate module=cli status=ok");
            println!("migrated {}", settings.db_path.display());
        }
        Command::CreateUser(args) => {
            let mut draft = NewUser::new(args.username, args.email);
            if args.staff {
                draft = draft.staff();
            }
            let repo = SqliteUserRepository::try_new(&conn).map_err(|err| err.to_string())?;
            let user = UserService::new(repo)
                .create_user(&draft)
                .map_err(|err| err.to_string())?;
            println!("created user {} (id {})", user.username, user.id);
        }
        Command::RemoveOldDeattributions(args) => {
            let deleted = NoteService::new(&mut conn)
                .purge_deattributions(args.num_days)
                .map_err(|err| err.to_string())?;
            println!("deleted {deleted} deattribution record(s)");
        }
        Command::ExportUserData(args) => {
            let repo = SqliteUserRepository::try_new(&conn).map_err(|err| err.to_string())?;
            let user = UserService::new(repo)
                .require_by_username(&args.username)
                .map_err(|err| err.to_string())?;
            let archive = ExportService::new(&conn, &settings)
                .export_user_data(&user)
                .map_err(|err| err.to_string())?;
            let path = args
                .output
                .unwrap_or_else(|| PathBuf::from(&archive.filename));
            fs::write(&path, &archive.bytes)
                .map_err(|err| format!("cannot write {}: {err}", path.display()))?;
            println!(
                "wrote {} note(s) to {}",
                archive.note_count,
                path.display()
            );
        }
        Command::Version => {}
    }
    Ok(())
}
