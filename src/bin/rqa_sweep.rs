//! Command-line front end for RQA-Core

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rqa_core::analysis::{significant_records, FeatureAggregator, RankBy, SensitivityScorer};
use rqa_core::config::{AnalysisConfig, ConfigLoader};
use rqa_core::data::{write_synthetic_dataset, Group, ParameterCombination, SyntheticDatasetSpec, TaskId};
use rqa_core::pipeline::{PipelineOrchestrator, PipelineRequest, PipelineStep};
use rqa_core::sweep::{ParameterSweepCoordinator, SweepGranularity, SweepRequest};
use rqa_core::utils::validation::validate_one_of;

/// Recurrence quantification analysis over gaze trajectories
#[derive(Parser, Debug)]
#[command(name = "rqa-sweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path, layered over the built-in defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override paths.data_root
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Override paths.output_root
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Override paths.data_version
    #[arg(long, global = true)]
    data_version: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a seeded synthetic dataset in the ingestion layout
    Generate {
        #[arg(long, default_value = "5")]
        subjects: usize,

        /// Tasks per subject, q1..qN
        #[arg(long, default_value = "5")]
        tasks: u8,

        #[arg(long, default_value = "300")]
        samples: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run the five-stage pipeline for one combination
    Run {
        #[arg(long)]
        m: Option<usize>,

        #[arg(long)]
        tau: Option<usize>,

        #[arg(long)]
        eps: Option<f64>,

        #[arg(long)]
        lmin: Option<usize>,

        /// Comma-separated groups (default: all)
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,

        /// Run a single step (1-5) against existing outputs
        #[arg(long)]
        step: Option<u8>,
    },

    /// Expand the configured grid and run it on the worker pool
    Sweep {
        #[arg(short, long)]
        workers: Option<usize>,

        /// `combination` or `file`
        #[arg(long)]
        granularity: Option<String>,

        /// Leave combinations with completed outputs alone
        #[arg(long)]
        skip_completed: bool,

        #[arg(long)]
        batch_id: Option<String>,
    },

    /// Score completed combinations and write both feature rankings
    Rank {
        /// overall_score, f_statistic, effect_size or task_consistency
        #[arg(long)]
        rank_by: Option<String>,

        /// Restrict to features starting with this metric name
        #[arg(long)]
        metric: Option<String>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        top_k_params: Option<usize>,

        #[arg(long)]
        top_n: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Generate {
            subjects,
            tasks,
            samples,
            seed,
        } => generate(&config, subjects, tasks, samples, seed),
        Commands::Run {
            m,
            tau,
            eps,
            lmin,
            groups,
            step,
        } => {
            let params = ParameterCombination::new(
                m.unwrap_or(config.rqa.m),
                tau.unwrap_or(config.rqa.tau),
                eps.unwrap_or(config.rqa.eps),
                lmin.unwrap_or(config.rqa.lmin),
            )?;
            run(&config, params, &groups, step)
        }
        Commands::Sweep {
            workers,
            granularity,
            skip_completed,
            batch_id,
        } => {
            let mut request = SweepRequest::from_config(&config);
            if let Some(workers) = workers {
                request.workers = workers;
            }
            if let Some(granularity) = granularity {
                request.granularity = parse_granularity(&granularity)?;
            }
            request.skip_completed |= skip_completed;
            request.batch_id = batch_id;
            sweep(&config, &request)
        }
        Commands::Rank {
            rank_by,
            metric,
            top_k,
            top_k_params,
            top_n,
        } => {
            let rank_by = match rank_by {
                Some(name) => name.parse::<RankBy>().map_err(anyhow::Error::msg)?,
                None => config.aggregation.rank_by,
            };
            rank(
                &config,
                rank_by,
                metric,
                top_k.unwrap_or(config.aggregation.top_k),
                top_k_params.unwrap_or(config.aggregation.top_k_params),
                top_n.unwrap_or(config.aggregation.top_n_features),
            )
        }
    }
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut loader = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            ConfigLoader::with_paths(vec![path.clone()])
        }
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("loading configuration")?;

    if let Some(root) = &cli.data_root {
        config.paths.data_root = root.clone();
    }
    if let Some(root) = &cli.output_root {
        config.paths.output_root = root.clone();
    }
    if let Some(version) = &cli.data_version {
        config.paths.data_version = version.clone();
    }

    if let Err(errors) = config.validate_consistency() {
        bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    info!(config = %config.summary(), "configuration loaded");
    Ok(config)
}

fn parse_groups(names: &[String]) -> Result<Vec<Group>> {
    if names.is_empty() {
        return Ok(Group::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| name.parse::<Group>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_granularity(name: &str) -> Result<SweepGranularity> {
    let name = name.trim().to_ascii_lowercase();
    validate_one_of("granularity", &name, &["combination", "file"])?;
    Ok(if name == "file" {
        SweepGranularity::File
    } else {
        SweepGranularity::Combination
    })
}

fn generate(config: &AnalysisConfig, subjects: usize, tasks: u8, samples: usize, seed: u64) -> Result<()> {
    let tasks = (1..=tasks).map(TaskId::new).collect::<Result<Vec<_>, _>>()?;
    let spec = SyntheticDatasetSpec {
        subjects_per_group: subjects,
        tasks,
        samples,
        seed,
    };
    let written = write_synthetic_dataset(&config.paths.data_root, &config.paths.data_version, &spec)?;
    println!(
        "wrote {} trajectories under {}",
        written.len(),
        config.paths.data_root.join(&config.paths.data_version).display()
    );
    Ok(())
}

fn run(config: &AnalysisConfig, params: ParameterCombination, groups: &[String], step: Option<u8>) -> Result<()> {
    let orchestrator = PipelineOrchestrator::new(config);
    let request = PipelineRequest::new(params, &parse_groups(groups)?, &config.paths.data_version);

    if let Some(number) = step {
        let step = PipelineStep::from_number(number).with_context(|| format!("no pipeline step {}", number))?;
        let records = orchestrator.run_step(&request, step)?;
        println!("{} finished: {} records", step, records);
        return Ok(());
    }

    let response = orchestrator.run(&request);
    if !response.success {
        bail!(
            "pipeline failed for {}: {}",
            response.signature,
            response.error.unwrap_or_default()
        );
    }
    println!(
        "{}: {} files processed, {} failed, {} records, {} significant features, {} plots",
        response.signature,
        response.processed_files,
        response.failed_files,
        response.total_records,
        response.significant_features,
        response.plots
    );
    println!("output: {}", response.output_dir.display());
    Ok(())
}

fn sweep(config: &AnalysisConfig, request: &SweepRequest) -> Result<()> {
    let coordinator = ParameterSweepCoordinator::new(PipelineOrchestrator::new(config));
    let report = coordinator.run(request)?;

    println!(
        "processed {}, failed {}, skipped {}, {} complete combinations",
        report.processed,
        report.failed,
        report.skipped,
        report.output_paths.len()
    );
    for error in &report.errors {
        println!("  error: {}", error);
    }
    Ok(())
}

fn rank(
    config: &AnalysisConfig,
    rank_by: RankBy,
    metric: Option<String>,
    top_k: usize,
    top_k_params: usize,
    top_n: usize,
) -> Result<()> {
    let scorer = SensitivityScorer::new(&config.paths.output_root, config.scoring.clone());
    let records = scorer.score_all()?;
    if records.is_empty() {
        bail!(
            "no completed parameter combinations under {}",
            config.paths.output_root.display()
        );
    }
    let records_file = scorer.write(&records)?;
    let significant = significant_records(&records, config.statistics.significance_level);
    println!(
        "{} records ({} significant) written to {}",
        records.len(),
        significant.len(),
        records_file.display()
    );

    let mut aggregator = FeatureAggregator::new(records).rank_by(rank_by);
    if let Some(metric) = metric {
        aggregator = aggregator.with_metric(metric);
    }

    println!("top features across parameters by {}:", rank_by.name());
    for (i, feature) in aggregator.cross_parameter(top_k).iter().enumerate() {
        println!(
            "  {:>2}. {:<24} score={:.4} F={:.2} p={:.4} n={}",
            i + 1,
            feature.feature,
            feature.mean_overall_score,
            feature.mean_f_statistic,
            feature.mean_p_value,
            feature.combinations
        );
    }

    println!("top parameter combinations:");
    for selection in aggregator.top_parameter(top_k_params, top_n) {
        let features: Vec<&str> = selection.features.iter().map(|r| r.feature.as_str()).collect();
        println!(
            "  {:>2}. {} mean={:.4} [{}]",
            selection.rank,
            selection.param_signature,
            selection.mean_score,
            features.join(", ")
        );
    }

    let (cross, top) = aggregator.write(&config.paths.output_root, top_k, top_k_params, top_n)?;
    println!("rankings written to {} and {}", cross.display(), top.display());
    Ok(())
}
