use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use clientops_tools::auth::{CredentialProvider, DEFAULT_SCOPES, InstalledAppFlow, TokenCache};
use clientops_tools::blueprint::BlueprintSettings;
use clientops_tools::config::{self, DbConfig};
use clientops_tools::directory::{DirectoryWriter, RowResult, SyncReport};
use clientops_tools::io::asana;
use clientops_tools::io::database::{self, PostgresDirectoryWriter, PostgresRecordStore};
use clientops_tools::io::drive::DriveClient;
use clientops_tools::io::excel_read;
use clientops_tools::io::sheets::SheetsClient;
use clientops_tools::model::RunMode;
use clientops_tools::reconcile::AuditOptions;
use clientops_tools::report::audit_header;
use clientops_tools::{Result, ToolError, logging, pipeline};
use reqwest::blocking::Client;

fn main() {
    config::load_env_file(Path::new("."));
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::init("info")?;
    match cli.command {
        Command::AuditFolders(args) => execute_audit(args),
        Command::SyncDirectory(args) => execute_sync(args),
        Command::PatchBlueprint(args) => execute_patch(args),
        Command::GenerateMigration(args) => execute_migration(args),
        Command::AsanaFields(args) => execute_asana_fields(args),
    }
}

fn execute_audit(args: AuditArgs) -> Result<()> {
    let db = args.db.resolve()?;
    let mode = RunMode::from_apply_flag(args.apply);
    println!("{}\n", audit_header(mode, args.tier2));

    let token = args.google.provider().load_or_authenticate()?;
    let mut drive = DriveClient::new(Client::new(), token.access_token, args.shared_drive);
    let mut store = PostgresRecordStore::new(database::connect(&db)?);

    let options = AuditOptions {
        root_folder_id: args.root_folder,
        include_contacts: args.tier2,
        mode,
    };
    let report = pipeline::audit_folders(&mut drive, &mut store, &options, &args.output)?;

    println!("{}", report.summary());
    println!("\nResults written to {}", args.output.display());
    Ok(())
}

fn execute_sync(args: SyncArgs) -> Result<()> {
    let db = args.db.resolve()?;
    let mode = RunMode::from_apply_flag(args.apply);
    println!("Mode: {mode}\n");

    let rows = match &args.xlsx {
        Some(path) if !path.exists() => return Err(ToolError::MissingInput(path.clone())),
        Some(path) => excel_read::read_rows(path, None)?,
        None => {
            let token = args.google.provider().load_or_authenticate()?;
            SheetsClient::new(Client::new(), token.access_token).read_range(&args.sheet_id, &args.range)?
        }
    };
    if rows.is_empty() {
        println!("No data found in sheet.");
        return Ok(());
    }
    println!("Read {} rows from sheet\n", rows.len() - 1);

    let report = if mode.is_apply() {
        let mut client = database::connect(&db)?;
        let mut writer = PostgresDirectoryWriter::begin(&mut client)?;
        pipeline::sync_directory(
            &rows,
            Some(&mut writer as &mut dyn DirectoryWriter),
            args.output.as_deref(),
        )?
    } else {
        pipeline::sync_directory(&rows, None, args.output.as_deref())?
    };

    print_sync_summary(&report);
    Ok(())
}

fn print_sync_summary(report: &SyncReport) {
    let verb = match report.mode {
        RunMode::Apply => "Written",
        RunMode::DryRun => "Would write",
    };
    println!("\n{verb}:");
    println!("  {} unique client TLA(s)", report.clients());
    println!("  {} client code row(s)", report.codes());

    let failures: Vec<&RowResult> = report.failures().collect();
    if !failures.is_empty() {
        println!("\n{} error(s):", failures.len());
        for failure in failures {
            if let RowResult::Failed { row, code, error, .. } = failure {
                println!("  Row {row} ({code}): {error}");
            }
        }
    }
}

fn execute_patch(args: PatchArgs) -> Result<()> {
    let output = args.output.unwrap_or_else(|| args.input.clone());
    let mut settings = BlueprintSettings::default();
    if let Some(url) = args.dashboard_url {
        settings.dashboard_url = url;
    }

    let summary = pipeline::patch_blueprint(&args.input, &output, &settings)?;
    println!(
        "Patched blueprint: {} renamed, {} removed, {} edited, {} inserted",
        summary.renamed,
        summary.removed,
        summary.edited,
        summary.inserted.unwrap_or(0)
    );
    println!("Written to {}", output.display());
    Ok(())
}

fn execute_migration(args: MigrationArgs) -> Result<()> {
    let (migration, written) = pipeline::generate_migration(&args.input, &args.out_dir)?;
    println!(
        "{} unique companies, {} client codes",
        migration.companies, migration.codes
    );
    for path in written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn execute_asana_fields(args: AsanaArgs) -> Result<()> {
    let token = args.token.ok_or(ToolError::MissingConfig {
        name: "ASANA_TOKEN",
        hint: "Pass --token or set ASANA_TOKEN to a personal access token.",
    })?;
    let fields = asana::list_custom_fields(&Client::new(), &token, &args.project)?;
    for field in fields {
        println!("{}  {}", field.gid, field.name);
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile, sync and migrate the client directory."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match client folders on the shared drive to directory records.
    AuditFolders(AuditArgs),
    /// Upsert clients and client codes from the directory sheet.
    SyncDirectory(SyncArgs),
    /// Swap the IO submission scenario's folder step for the tiered flow.
    PatchBlueprint(PatchArgs),
    /// Generate SQL migration files from a directory CSV export.
    GenerateMigration(MigrationArgs),
    /// List the custom fields of a task tracker project.
    AsanaFields(AsanaArgs),
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "DB_HOST", hide_env_values = true)]
    db_host: Option<String>,

    #[arg(long, env = "DB_NAME", hide_env_values = true)]
    db_name: Option<String>,

    #[arg(long, env = "DB_USER", hide_env_values = true)]
    db_user: Option<String>,

    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    db_pass: Option<String>,

    #[arg(long, env = "DB_PORT")]
    db_port: Option<u16>,
}

impl DbArgs {
    fn resolve(&self) -> Result<DbConfig> {
        DbConfig::from_parts(
            self.db_host.clone(),
            self.db_name.clone(),
            self.db_user.clone(),
            self.db_pass.clone(),
            self.db_port,
        )
    }
}

#[derive(Args)]
struct GoogleArgs {
    /// Cached OAuth token.
    #[arg(long, default_value = config::DEFAULT_TOKEN_FILE)]
    token_file: PathBuf,

    /// OAuth desktop client secrets, needed only for a fresh authorization.
    #[arg(long, default_value = config::DEFAULT_SECRETS_FILE)]
    credentials: PathBuf,
}

impl GoogleArgs {
    fn provider(&self) -> InstalledAppFlow {
        InstalledAppFlow::new(
            TokenCache::new(&self.token_file),
            &self.credentials,
            &DEFAULT_SCOPES,
        )
    }
}

#[derive(Args)]
struct AuditArgs {
    /// Write missing folder ids to the database (default: dry run).
    #[arg(long)]
    apply: bool,

    /// Also audit the contact folders inside each client folder.
    #[arg(long)]
    tier2: bool,

    /// Report path; `.xlsx` writes a workbook, anything else CSV.
    #[arg(long, default_value = "audit_results.csv")]
    output: PathBuf,

    #[arg(long, default_value = config::DEFAULT_CLIENT_PROJECTS_FOLDER)]
    root_folder: String,

    #[arg(long, default_value = config::DEFAULT_SHARED_DRIVE)]
    shared_drive: String,

    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    google: GoogleArgs,
}

#[derive(Args)]
struct SyncArgs {
    /// Write to the database (default: dry run).
    #[arg(long)]
    apply: bool,

    /// Read a local `.xlsx` export instead of the live sheet.
    #[arg(long)]
    xlsx: Option<PathBuf>,

    /// Optional per-row report path.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = config::DEFAULT_DIRECTORY_SHEET)]
    sheet_id: String,

    #[arg(long, default_value = config::DEFAULT_DIRECTORY_RANGE)]
    range: String,

    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    google: GoogleArgs,
}

#[derive(Args)]
struct PatchArgs {
    /// Blueprint JSON exported from the automation platform.
    #[arg(long)]
    input: PathBuf,

    /// Destination; defaults to rewriting the input in place.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Dashboard link used in the notification and task modules.
    #[arg(long)]
    dashboard_url: Option<String>,
}

#[derive(Args)]
struct MigrationArgs {
    /// Directory sheet CSV export.
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Args)]
struct AsanaArgs {
    /// Project gid.
    #[arg(long)]
    project: String,

    #[arg(long, env = "ASANA_TOKEN", hide_env_values = true)]
    token: Option<String>,
}
