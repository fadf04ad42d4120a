//! Dispatcher binary entry point

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use dispatcher::{
    core::{ResultPaths, RunCoordinator, TaskSet, TemplatePromptSource, DEFAULT_RESULTS_DIR, DEFAULT_TEMPLATE_NAME},
    process_task,
    services::{
        resolve_credentials, EnvApiKeySource, FunctionCatalog, LockSettings, ResultStore, RunSummaryWriter,
        DEFAULT_FUNCTIONS_FILE,
    },
    DispatchContext,
};
use shared::{
    logging, run_info, select_models, AnalysisType, ModelSpec, ProviderId, RunId, TEST_FUNCTIONS,
};

/// Brain region analysis with LLMs
#[derive(Parser)]
#[command(name = "dispatcher")]
#[command(about = "Dispatches brain-region analysis prompts to LLM providers")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ask each model for the top 5 functions of every region
    Functions(RunArgs),
    /// Ask each model how likely every region is involved in each function
    Probabilities(RunArgs),
    /// Run both analyses with the dummy model and a single worker
    Test(RunArgs),
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(long, default_value = "human", value_parser = ["human", "macaque", "mouse"])]
    species: String,

    /// Atlas the regions belong to
    #[arg(long)]
    atlas_name: String,

    /// Comma-separated brain regions
    #[arg(long, conflicts_with = "regions_file")]
    regions: Option<String>,

    /// File with one region per line
    #[arg(long)]
    regions_file: Option<PathBuf>,

    /// 'all', 'all-excl-dummy', 'paid', 'free', 'dummy', or comma-separated model names
    #[arg(long, default_value = "dummy")]
    models: String,

    /// Comma-separated functions (probabilities only)
    #[arg(long, conflicts_with = "function_group")]
    functions: Option<String>,

    /// Named group from the functions file (probabilities only)
    #[arg(long)]
    function_group: Option<String>,

    /// JSON file with the default function list and function groups
    #[arg(long, default_value = DEFAULT_FUNCTIONS_FILE)]
    functions_file: PathBuf,

    #[arg(long, default_value = DEFAULT_TEMPLATE_NAME)]
    prompt_template_name: String,

    /// Directory holding `<analysis>/<name>.txt` prompt templates
    #[arg(long, default_value = "prompts")]
    prompts_dir: PathBuf,

    /// Query left and right hemispheres separately
    #[arg(long)]
    separate_hemispheres: bool,

    /// Remove raw responses after a complete run
    #[arg(long)]
    skip_raw_saving: bool,

    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,

    /// Remove lock files older than this many seconds
    #[arg(long)]
    lock_stale_secs: Option<u64>,
}

impl RunArgs {
    fn regions(&self) -> anyhow::Result<Vec<String>> {
        let regions: Vec<String> = match (&self.regions, &self.regions_file) {
            (Some(list), _) => split_list(list),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading regions from {}", path.display()))?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
            (None, None) => anyhow::bail!("either --regions or --regions-file is required"),
        };
        anyhow::ensure!(!regions.is_empty(), "no regions given");
        Ok(regions)
    }

    /// Functions for a probabilities run: a named group, an explicit list, or the file's default list
    async fn functions(&self) -> anyhow::Result<Vec<String>> {
        if let Some(group) = &self.function_group {
            let catalog = FunctionCatalog::load(&self.functions_file).await?;
            let functions = catalog.group(group)?.to_vec();
            run_info!("Using functions from group '{}': {}", group, functions.join(", "));
            return Ok(functions);
        }
        if let Some(list) = &self.functions {
            let functions = split_list(list);
            run_info!("Using specified functions: {}", functions.join(", "));
            return Ok(functions);
        }
        let functions = FunctionCatalog::load(&self.functions_file).await?.functions;
        run_info!("Using default functions: {}", functions.join(", "));
        Ok(functions)
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One analysis pass of a command
struct Plan {
    analysis_type: AnalysisType,
    functions: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    RunId::init();
    logging::init_tracing_with_level(Some(&cli.log_level));
    logging::log_startup("dispatcher");

    match run(cli.command).await {
        Ok(()) => {
            logging::log_success("Analysis completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::log_error("Analysis", &format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let (args, plans) = match command {
        Command::Functions(args) => {
            let plans = vec![Plan { analysis_type: AnalysisType::Functions, functions: Vec::new() }];
            (args, plans)
        }
        Command::Probabilities(args) => {
            let functions = args.functions().await?;
            (args, vec![Plan { analysis_type: AnalysisType::Probabilities, functions }])
        }
        Command::Test(mut args) => {
            args.models = "dummy".to_string();
            args.workers = 1;
            let plans = vec![
                Plan { analysis_type: AnalysisType::Functions, functions: Vec::new() },
                Plan {
                    analysis_type: AnalysisType::Probabilities,
                    functions: TEST_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
                },
            ];
            (args, plans)
        }
    };

    let regions = args.regions()?;
    let models = select_models(&args.models)?;
    run_info!(
        "Using models: {}",
        models.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
    );

    for plan in plans {
        logging::log_progress(
            &format!("Running {} analysis", plan.analysis_type),
            &format!("{} regions, species {}", regions.len(), args.species),
        );
        run_analysis(&args, &plan, &regions, &models).await?;
        logging::log_success(&format!("{} analysis complete", plan.analysis_type));
    }
    Ok(())
}

async fn run_analysis(
    args: &RunArgs,
    plan: &Plan,
    regions: &[String],
    models: &[&'static ModelSpec],
) -> anyhow::Result<()> {
    let model_names: Vec<String> = models.iter().map(|m| m.name.to_string()).collect();
    let tasks = TaskSet::build(
        plan.analysis_type,
        regions,
        args.separate_hemispheres,
        &plan.functions,
        &model_names,
    )?;

    let providers: BTreeSet<ProviderId> = models.iter().map(|m| m.provider).collect();
    let with_embeddings = plan.analysis_type == AnalysisType::Functions
        && providers.iter().any(|provider| *provider != ProviderId::Dummy);

    let mut required = providers.clone();
    if with_embeddings {
        required.insert(ProviderId::OpenAI);
    }
    let keys = resolve_credentials(&EnvApiKeySource::load(), required).await?;

    let paths = ResultPaths::new(
        &args.results_dir,
        &args.species,
        &args.atlas_name,
        &args.prompt_template_name,
    );
    let prompts = TemplatePromptSource::load(
        &args.prompts_dir,
        &args.prompt_template_name,
        plan.analysis_type,
        &args.species,
    )?;
    let store = ResultStore::new(LockSettings {
        stale_after: args.lock_stale_secs.map(Duration::from_secs),
        ..LockSettings::default()
    });

    let ctx = Arc::new(
        DispatchContext::builder(paths.clone(), Arc::new(prompts))
            .store(store)
            .connect(providers, &keys, with_embeddings)?
            .build(),
    );

    let post = RunSummaryWriter::new(paths, &args.species, model_names).skip_raw_saving(args.skip_raw_saving);
    let report = RunCoordinator::new(args.workers)?
        .run_with_post_processing(tasks, move |task| process_task(ctx.clone(), task), &post)
        .await?;

    report.ensure_complete()?;
    Ok(())
}
