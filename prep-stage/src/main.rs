//! prep-stage - derivative staging tool
//!
//! Thin command-line front end over the staging library:
//! - `init-config`: write the default `user_params.json`
//! - `status`: ask the completion oracle about one recording
//! - `fingerprint`: check a (data, config) file pair against the ledger

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prep_common::config::{default_config_path, resolve_root_folder, TomlConfig};
use prep_stage::{
    build_defaults, is_complete, DataType, DefaultsRequest, FingerprintLedger, LedgerOptions,
    RecordingIdentity, Selection, StagingLayout,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for prep-stage
#[derive(Parser, Debug)]
#[command(name = "prep-stage")]
#[command(about = "Derivative staging and dedup for the EEG preprocessing pipeline")]
#[command(version)]
struct Cli {
    /// Bootstrap TOML (defaults to <config dir>/prep/prep.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data root folder
    #[arg(short, long, global = true, env = "PREP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default parameter file
    InitConfig {
        /// Where derivatives are written (defaults to the root folder)
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Subjects to include (all when omitted)
        #[arg(long, value_delimiter = ',')]
        subjects: Vec<String>,

        /// Tasks to include (all when omitted)
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        except_subjects: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        except_tasks: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        except_runs: Vec<String>,

        /// Directory to write user_params.json into
        #[arg(long, default_value = ".")]
        write_to: PathBuf,
    },

    /// Report whether a recording's final artifact exists
    Status {
        #[command(flatten)]
        recording: RecordingArgs,

        /// Pipeline name used in the derivative tree
        #[arg(long, default_value = prep_stage::layout::DEFAULT_PIPELINE_NAME)]
        pipeline_name: String,

        /// Treat existing outputs as stale
        #[arg(long)]
        rewrite: bool,
    },

    /// Check a (data, config) pair against the fingerprint ledger, recording it if new
    Fingerprint {
        /// Serialized data file
        #[arg(long)]
        data: PathBuf,

        /// Serialized config file
        #[arg(long)]
        params: PathBuf,

        /// Directory holding the ledger (defaults to the root folder)
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RecordingArgs {
    #[arg(long)]
    subject: String,
    #[arg(long)]
    session: String,
    #[arg(long)]
    task: String,
    #[arg(long)]
    run: String,
    #[arg(long, default_value = "eeg")]
    datatype: String,
}

fn to_set(items: Vec<String>) -> BTreeSet<String> {
    items.into_iter().collect()
}

fn to_selection(items: Vec<String>) -> Selection {
    if items.is_empty() {
        Selection::All
    } else {
        Selection::subset(items)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml = cli
        .config
        .clone()
        .or_else(default_config_path)
        .map(|path| TomlConfig::load_or_default(&path))
        .unwrap_or_default();

    // RUST_LOG wins over the bootstrap level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root = resolve_root_folder(cli.root_folder.as_deref(), &toml);
    info!("Root folder: {}", root.display());

    match cli.command {
        Command::InitConfig {
            output_root,
            subjects,
            tasks,
            except_subjects,
            except_tasks,
            except_runs,
            write_to,
        } => {
            let request = DefaultsRequest {
                output_root: output_root.unwrap_or_else(|| root.clone()),
                root,
                subjects: to_selection(subjects),
                tasks: to_selection(tasks),
                except_subjects: to_set(except_subjects),
                except_tasks: to_set(except_tasks),
                except_runs: to_set(except_runs),
                write_to: Some(write_to.clone()),
            };
            build_defaults(request)
                .await
                .context("Failed to write default parameter file")?;
            println!("{}", write_to.join(prep_stage::defaults::CONFIG_FILE_NAME).display());
        }

        Command::Status {
            recording,
            pipeline_name,
            rewrite,
        } => {
            let layout = StagingLayout::with_pipeline_name(&root, pipeline_name);
            let identity = RecordingIdentity::new(
                recording.subject,
                recording.session,
                recording.task,
                recording.run,
            );
            let datatype = DataType::new(recording.datatype);

            let done = is_complete(&layout, &identity, &datatype, rewrite).await?;
            println!("{}", if done { "complete" } else { "pending" });
        }

        Command::Fingerprint {
            data,
            params,
            ledger_dir,
        } => {
            let data_bytes = tokio::fs::read(&data)
                .await
                .with_context(|| format!("Failed to read {}", data.display()))?;
            let config_bytes = tokio::fs::read(&params)
                .await
                .with_context(|| format!("Failed to read {}", params.display()))?;

            let ledger_dir = ledger_dir.unwrap_or_else(|| root.clone());
            let ledger = FingerprintLedger::open(&ledger_dir, LedgerOptions::from(&toml.ledger))
                .await
                .context("Failed to open fingerprint ledger")?;

            let seen = ledger.seen_before(&data_bytes, &config_bytes).await?;
            ledger.close().await;
            println!("{}", if seen { "seen" } else { "new" });
        }
    }

    Ok(())
}
