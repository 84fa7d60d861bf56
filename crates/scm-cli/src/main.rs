use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

use commands::{TemplateKind, ViewArgs};

#[derive(Parser)]
#[command(name = "scm")]
#[command(about = "Supply-chain dashboard CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile an Order CSV with a Supplier/Line-Item CSV
    Reconcile {
        #[command(flatten)]
        view: ViewArgs,

        /// Print the full `{orders, suppliers, errors}` document as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print KPI tiles for the reconciled dataset
    Kpis {
        #[command(flatten)]
        view: ViewArgs,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print pipeline board metrics per stage
    Pipeline {
        #[command(flatten)]
        view: ViewArgs,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Emit a sheet template with example rows
    Template {
        #[arg(value_enum)]
        kind: TemplateKind,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<String>,

        /// Reference date for example rows (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Download both Google Sheets as CSV and reconcile them
    Fetch {
        /// Order sheet URL (share, edit or export form); defaults to config
        #[arg(long)]
        order_url: Option<String>,

        /// Supplier sheet URL; defaults to config
        #[arg(long)]
        supplier_url: Option<String>,

        /// Directory receiving orders.csv and suppliers.csv
        #[arg(long, default_value = ".")]
        out_dir: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Generate a mock dataset as JSON
    Mock {
        /// Number of orders; defaults to config
        #[arg(long)]
        count: Option<usize>,

        /// Number of suppliers; defaults to config
        #[arg(long)]
        suppliers: Option<usize>,

        /// RNG seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

/// Exit codes: 0 clean, 2 reconciliation produced errors, 1 IO/usage failure.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();

    match run(cli.cmd).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cmd: Commands) -> anyhow::Result<ExitCode> {
    match cmd {
        Commands::Reconcile { view, json } => commands::views::reconcile(&view, json),
        Commands::Kpis { view, json } => commands::views::kpis(&view, json),
        Commands::Pipeline { view, json } => commands::views::pipeline(&view, json),
        Commands::Template { kind, out, date } => {
            commands::sheets::template(kind, out.as_deref(), date.as_deref())
        }
        Commands::Fetch {
            order_url,
            supplier_url,
            out_dir,
            config_paths,
        } => {
            commands::sheets::fetch(
                order_url.as_deref(),
                supplier_url.as_deref(),
                &out_dir,
                &config_paths,
            )
            .await
        }
        Commands::Mock {
            count,
            suppliers,
            seed,
            config_paths,
        } => commands::mock::mock(count, suppliers, seed, &config_paths),
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = scm_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
