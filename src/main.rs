use adsfetch::{
    accounts_for_script, config::normalize_customer_id, fetch_report, get_customer_ids,
    macros::parse_macro_pair, writer, AdsConfig, AdsRestClient, QueryMacros, Report, ReportSpec,
    RowParser,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Client;
use std::{
    collections::HashMap,
    fs,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Pull reports from the Google Ads API into flat rows
#[derive(Parser)]
#[command(name = "adsfetch", version)]
struct Cli {
    /// Path to google-ads.yaml (defaults to ./google-ads.yaml, then $HOME)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the leaf accounts under a customer
    Accounts {
        #[arg(short, long)]
        customer_id: String,
    },
    /// Run queries against every leaf account under a customer
    Report {
        #[arg(short, long)]
        customer_id: String,

        /// Query files, or inline query text
        #[arg(required = true)]
        queries: Vec<String>,

        /// Query parameter substituted for `{key}`; repeatable
        #[arg(long = "macro", value_name = "KEY=VALUE")]
        macros: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Console)]
        output: OutputFormat,

        /// Directory for file outputs, one `<script>.<ext>` per query
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,

        /// Query only the given customer instead of its leaf accounts
        #[arg(long)]
        no_expand: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Console,
    Csv,
    Jsonl,
    Parquet,
}

impl OutputFormat {
    fn extension(self) -> Option<&'static str> {
        match self {
            OutputFormat::Console => None,
            OutputFormat::Csv => Some("csv"),
            OutputFormat::Jsonl => Some("jsonl"),
            OutputFormat::Parquet => Some("parquet"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // ─── 2) config + client ──────────────────────────────────────────
    let cfg = AdsConfig::load(cli.config.as_deref())?;
    let ads = AdsRestClient::connect(Client::new(), &cfg).await?;

    match cli.command {
        Command::Accounts { customer_id } => {
            let customer_id = normalize_customer_id(&customer_id);
            let ids = get_customer_ids(&ads, &customer_id).await?;
            let mut sorted: Vec<_> = ids.into_iter().collect();
            sorted.sort();
            for (id, name) in sorted {
                println!("{}\t{}", id, name);
            }
        }
        Command::Report {
            customer_id,
            queries,
            macros,
            output,
            destination,
            no_expand,
        } => {
            let start = Instant::now();
            let values = macros
                .iter()
                .map(|m| parse_macro_pair(m))
                .collect::<Result<HashMap<_, _>>>()?;
            let macros = QueryMacros::new(values);
            let scripts = load_scripts(&queries)?;
            let customer_id = normalize_customer_id(&customer_id);

            // ─── 3) resolve accounts ─────────────────────────────────
            let accounts = if no_expand {
                vec![customer_id]
            } else {
                let mut ids: Vec<String> = get_customer_ids(&ads, &customer_id)
                    .await?
                    .into_keys()
                    .collect();
                ids.sort();
                ids
            };
            info!(accounts = accounts.len(), scripts = scripts.len(), "running reports");

            // ─── 4) fetch + write, one script at a time ──────────────
            if output.extension().is_some() {
                fs::create_dir_all(&destination)
                    .with_context(|| format!("creating {}", destination.display()))?;
            }
            for (name, text) in &scripts {
                let spec = ReportSpec::from_template(text, &macros)
                    .with_context(|| format!("preparing script {}", name))?;
                let targets = accounts_for_script(name, &accounts);
                let report = fetch_report(&ads, targets, &spec, &RowParser)
                    .await
                    .with_context(|| format!("running script {}", name))?;
                write_report(&report, name, output, &destination)?;
                info!(script = %name, rows = report.rows.len(), "script done");
            }
            info!(elapsed = ?start.elapsed(), "done");
        }
    }

    Ok(())
}

/// `(script name, query text)` per argument; files are named by their stem.
fn load_scripts(args: &[String]) -> Result<Vec<(String, String)>> {
    let mut scripts = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let path = Path::new(arg);
        if path.is_file() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading query {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("query_{}", i));
            scripts.push((name, text));
        } else if args.len() == 1 {
            scripts.push(("query".to_string(), arg.clone()));
        } else {
            scripts.push((format!("query_{}", i), arg.clone()));
        }
    }
    Ok(scripts)
}

fn write_report(report: &Report, name: &str, format: OutputFormat, dir: &Path) -> Result<()> {
    let Some(ext) = format.extension() else {
        println!("{}", name);
        return writer::write_console(report, io::stdout().lock());
    };
    let path = dir.join(format!("{}.{}", name, ext));
    if format == OutputFormat::Parquet {
        return writer::write_parquet(report, &path);
    }
    let file =
        fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let out = BufWriter::new(file);
    match format {
        OutputFormat::Csv => writer::write_csv(report, out)?,
        _ => writer::write_json_lines(report, out)?,
    }
    info!(path = %path.display(), rows = report.rows.len(), "wrote report");
    Ok(())
}
