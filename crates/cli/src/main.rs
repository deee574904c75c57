//! `roscenes` -- recorded-scene to nuScenes dataset converter.
//!
//! Every per-scene command takes a scene library (a directory whose children
//! are scene directories named `{scene_id}_{car_id}`) and runs on the bounded
//! worker pool. Reports are printed to stdout as JSON; logs go to stderr.
//!
//! # Environment variables
//!
//! Settings come from `ROSCENES_*` variables (see `DatasetConfig::from_env`),
//! optionally through a `.env` file. Command-line flags take precedence.
//! `RUST_LOG` controls log filtering.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use roscenes_core::config::{DatasetConfig, ValidationMode};
use roscenes_core::repair::RepairOptions;
use roscenes_core::token;
use roscenes_pipeline::batch::{list_scene_dirs, run_scene_batch, BatchReport};
use roscenes_pipeline::build::build_scene_database;
use roscenes_pipeline::export::export_scene_to_sus;
use roscenes_pipeline::load::load_scene_labels;
use roscenes_pipeline::merge::{merge_dataset, read_scene_list, MergeOptions, SceneLists};
use roscenes_pipeline::repair::repair_scene_labels;
use roscenes_pipeline::tables::table_counts;

#[derive(Parser)]
#[command(name = "roscenes")]
#[command(about = "Convert recorded driving scenes into nuScenes-format datasets")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Channel whose key frames define samples
    #[arg(long, global = true)]
    main_channel: Option<String>,

    /// Handling of unknown category, attribute and visibility values
    #[arg(long, global = true)]
    validation_mode: Option<ValidationMode>,

    /// Apply per-type size and point-count filters on label import
    #[arg(long, global = true)]
    filter: bool,

    /// Scenes processed in parallel
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Args)]
struct SceneSelection {
    /// Directory holding scene directories
    library: PathBuf,

    /// Only process these scenes
    #[arg(long = "scene")]
    scenes: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the v1.0-all tables of each scene from its frames and metadata
    Build(SceneSelection),

    /// Import SUS labels into instance and sample_annotation tables
    Load(SceneSelection),

    /// Lay out each scene for the SUS annotation tool
    Export(SceneSelection),

    /// Check (and optionally fix) SUS label files
    Repair {
        #[command(flatten)]
        selection: SceneSelection,

        /// Drop boxes with zero lidar points
        #[arg(long)]
        drop_empty: bool,

        /// Write repaired files back; otherwise only report
        #[arg(long)]
        write: bool,
    },

    /// Merge labelled scenes into trainval and test splits
    Merge {
        /// Directory holding scene directories
        library: PathBuf,

        /// Output dataset directory
        #[arg(short, long)]
        output: PathBuf,

        /// Share of scenes assigned to the test split
        #[arg(long)]
        test_ratio: Option<f64>,

        /// Scene list for the trainval split
        #[arg(long, requires = "test_list")]
        trainval_list: Option<PathBuf>,

        /// Scene list for the test split
        #[arg(long, requires = "trainval_list")]
        test_list: Option<PathBuf>,
    },

    /// Print record counts of a table directory
    Info {
        /// A v1.0-* directory
        tables: PathBuf,
    },

    /// Compute the token of an entity
    Token {
        /// Print the dashed uppercase form
        #[arg(long)]
        five_segment: bool,

        #[command(subcommand)]
        key: TokenKey,
    },
}

#[derive(Subcommand)]
enum TokenKey {
    Scene { scene: String },
    Sample { scene: String, timestamp: i64 },
    SampleData { scene: String, timestamp: i64, channel: String },
    EgoPose { scene: String, timestamp: i64 },
    CalibratedSensor { scene: String, channel: String },
    Sensor { channel: String },
    Log { scene: String },
    Map { map_name: String },
    Instance { scene: String, track_id: String },
    SampleAnnotation { scene: String, timestamp: i64, object_id: usize },
    Category { name: String },
    Attribute { name: String },
    Visibility { level: String },
}

impl TokenKey {
    fn token(&self) -> String {
        match self {
            Self::Scene { scene } => token::scene_token(scene),
            Self::Sample { scene, timestamp } => token::sample_token(scene, *timestamp),
            Self::SampleData {
                scene,
                timestamp,
                channel,
            } => token::sample_data_token(scene, *timestamp, channel),
            Self::EgoPose { scene, timestamp } => token::ego_pose_token(scene, *timestamp),
            Self::CalibratedSensor { scene, channel } => {
                token::calibrated_sensor_token(scene, channel)
            }
            Self::Sensor { channel } => token::sensor_token(channel),
            Self::Log { scene } => token::log_token(scene),
            Self::Map { map_name } => token::map_token(map_name),
            Self::Instance { scene, track_id } => token::instance_token(scene, Some(track_id)),
            Self::SampleAnnotation {
                scene,
                timestamp,
                object_id,
            } => token::sample_annotation_token(scene, Some(*timestamp), Some(*object_id)),
            Self::Category { name } => token::category_token(name),
            Self::Attribute { name } => token::attribute_token(Some(name)),
            Self::Visibility { level } => token::visibility_token(level).to_string(),
        }
    }
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "roscenes=info,roscenes_pipeline=info,roscenes_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(global: &GlobalArgs) -> anyhow::Result<DatasetConfig> {
    let mut config = DatasetConfig::from_env().context("invalid ROSCENES_* configuration")?;
    if let Some(channel) = &global.main_channel {
        config.main_channel = channel.clone();
    }
    if let Some(mode) = global.validation_mode {
        config.validation_mode = mode;
    }
    if global.filter {
        config.filter_enabled = true;
    }
    if let Some(workers) = global.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish_batch<T: Serialize>(report: BatchReport<T>) -> anyhow::Result<()> {
    print_json(&report)?;
    if !report.is_success() {
        bail!("{} scene(s) failed", report.failed.len());
    }
    Ok(())
}

async fn run_per_scene<T, F>(
    selection: &SceneSelection,
    config: &DatasetConfig,
    job: F,
) -> anyhow::Result<()>
where
    T: Serialize + Send + 'static,
    F: Fn(&Path, &DatasetConfig) -> roscenes_pipeline::Result<T> + Send + Sync + 'static,
{
    let scenes = list_scene_dirs(&selection.library, &selection.scenes)?;
    tracing::info!(scenes = scenes.len(), workers = config.workers, "Starting batch");
    let job_config = config.clone();
    let report = run_scene_batch(scenes, config.workers, move |root| job(root, &job_config)).await?;
    finish_batch(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.global.json_logs);
    let config = load_config(&cli.global)?;

    match cli.command {
        Command::Build(selection) => {
            run_per_scene(&selection, &config, build_scene_database).await
        }
        Command::Load(selection) => run_per_scene(&selection, &config, load_scene_labels).await,
        Command::Export(selection) => {
            run_per_scene(&selection, &config, export_scene_to_sus).await
        }
        Command::Repair {
            selection,
            drop_empty,
            write,
        } => {
            let options = RepairOptions {
                drop_empty_boxes: drop_empty,
            };
            run_per_scene(&selection, &config, move |root, _| {
                repair_scene_labels(root, options, write)
            })
            .await
        }
        Command::Merge {
            library,
            output,
            test_ratio,
            trainval_list,
            test_list,
        } => {
            let lists = match (trainval_list, test_list) {
                (Some(trainval), Some(test)) => Some(SceneLists {
                    trainval: read_scene_list(&trainval)?,
                    test: read_scene_list(&test)?,
                }),
                _ => None,
            };
            let options = MergeOptions {
                output,
                workers: config.workers,
                test_ratio: test_ratio.unwrap_or(config.test_ratio),
                lists,
            };
            let report = merge_dataset(&library, options)
                .await
                .with_context(|| format!("merge of {} failed", library.display()))?;
            print_json(&report)?;
            if !report.is_success() {
                bail!("merge finished with failures");
            }
            Ok(())
        }
        Command::Info { tables } => {
            let counts = table_counts(&tables)
                .with_context(|| format!("cannot read tables in {}", tables.display()))?;
            print_json(&counts)
        }
        Command::Token { five_segment, key } => {
            let token = key.token();
            if five_segment && token::is_valid_token(&token) {
                println!("{}", token::to_five_segment(&token)?);
            } else {
                println!("{token}");
            }
            Ok(())
        }
    }
}
