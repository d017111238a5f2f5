use anyhow::Result;
use churnguard::db::{migrate, Db};
use churnguard::ingest::{
    import_csv, CsvImportReport, CustomerIssueCsv, EmailNotificationCsv, PredictionCsv,
};
use churnguard::repo::{CustomerIssueRepo, EmailNotificationRepo, PredictionRepo};
use churnguard::Config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import a churn data CSV into the ChurnGuard database")]
struct Args {
    /// Path to the CSV file to import
    #[arg(short, long)]
    file: PathBuf,

    /// Which entity the file contains
    #[arg(short, long, value_enum)]
    kind: ImportKind,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImportKind {
    Issues,
    Predictions,
    Emails,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    // Same boundary checks the HTTP upload applies
    let filename = args.file.to_string_lossy();
    if !filename.ends_with(".csv") {
        anyhow::bail!("File must be a CSV file");
    }
    let bytes = std::fs::read(&args.file)?;
    let csv_content = String::from_utf8(bytes)
        .map_err(|_| anyhow::anyhow!("File must be a valid UTF-8 encoded CSV file"))?;

    // Load configuration
    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    // Initialize database
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    let report = match args.kind {
        ImportKind::Issues => {
            let repo = CustomerIssueRepo::new(db);
            import_csv(&CustomerIssueCsv, &repo, &csv_content).await
        }
        ImportKind::Predictions => {
            let repo = PredictionRepo::new(db);
            import_csv(&PredictionCsv, &repo, &csv_content).await
        }
        ImportKind::Emails => {
            let repo = EmailNotificationRepo::new(db);
            import_csv(&EmailNotificationCsv, &repo, &csv_content).await
        }
    };

    print_report(&report)?;

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &CsvImportReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
