use anyhow::{Context, Result};
use genstudio::cli::{
    Args, ConfigDiscovery, ExecutionMode, HistoryAction, InteractiveConfig, QuotaAction,
    RunConfig, read_artifact, write_artifact,
};
use genstudio::client::{
    CredentialHandle, CredentialSelector, EnvCredentialSelector, PromptCredentialSelector,
};
use genstudio::integration::VIDEO_PHASES;
use genstudio::jobs::JobState;
use genstudio::service::types::{OperationSettings, UpscaleFactor};
use genstudio::session::StackState;
use genstudio::storage::FilterKind;
use genstudio::{
    ActionOutcome, Artifact, CancelFlag, GenerationError, StudioComponents, StudioSystem,
    ToolAction, UserAction,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let verbose = match &mode {
        ExecutionMode::Run(config) => config.verbose,
        ExecutionMode::Interactive(config) => config.verbose,
        _ => false,
    };
    init_logging(verbose);

    match mode {
        ExecutionMode::Run(config) => run_single_action(config).await,
        ExecutionMode::Interactive(config) => run_interactive_mode(config).await,
        ExecutionMode::History {
            config_override,
            action,
        } => run_history_command(config_override, action).await,
        ExecutionMode::Quota {
            config_override,
            action,
        } => run_quota_command(config_override, action).await,
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "genstudio=debug"
    } else {
        "genstudio=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn open_studio(
    config_override: Option<&Path>,
    dry_run: bool,
    prompt_for_credentials: bool,
) -> Result<StudioSystem> {
    let mut config = ConfigDiscovery::with_data_dir(ConfigDiscovery::load(config_override)?);
    if dry_run {
        config.service.dry_run = true;
    }
    if let Ok(base_url) = std::env::var(genstudio::env::BASE_URL_ENV) {
        config.service.base_url = base_url;
    }

    let credential = CredentialHandle::new(std::env::var(&config.service.api_key_env).ok());
    let selector: Arc<dyn CredentialSelector> = if prompt_for_credentials {
        Arc::new(PromptCredentialSelector::new(credential.clone()))
    } else {
        Arc::new(EnvCredentialSelector::new(
            config.service.api_key_env.clone(),
            credential.clone(),
        ))
    };

    let components = StudioComponents::with_selector(&config, credential, selector)?;
    StudioSystem::with_components(config, components)
        .await
        .context("Failed to initialize studio")
}

/// Run an action, cancelling a video job on Ctrl-C
async fn perform_with_console(
    studio: &StudioSystem,
    action: UserAction,
) -> Result<ActionOutcome, GenerationError> {
    let cancel = CancelFlag::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let phases: Vec<String> = VIDEO_PHASES.iter().map(|p| p.to_string()).collect();
    let result = studio
        .perform_with_progress(
            action,
            &phases,
            |progress| {
                if progress.state == JobState::Polling || progress.state == JobState::Submitted {
                    println!("  {} (check {})", progress.phase, progress.poll_count);
                }
            },
            &cancel,
        )
        .await;

    watcher.abort();
    result
}

fn save_results(out_dir: &Path, outcome: &ActionOutcome) -> Result<Vec<PathBuf>> {
    outcome
        .results
        .iter()
        .enumerate()
        .map(|(i, artifact)| {
            write_artifact(out_dir, &format!("{}-{}", outcome.record_id, i + 1), artifact)
        })
        .collect()
}

fn report_outcome(out_dir: &Path, outcome: &ActionOutcome) -> Result<()> {
    println!(
        "Completed: {} produced {} result(s) [record {}]",
        outcome.plan.kind,
        outcome.results.len(),
        outcome.record_id
    );
    for path in save_results(out_dir, outcome)? {
        println!("   {}", path.display());
    }
    if let Some(remaining) = outcome.quota_remaining {
        println!("   {} video generation(s) left today", remaining);
    }
    Ok(())
}

async fn run_single_action(config: RunConfig) -> Result<()> {
    let studio = open_studio(config.config_override.as_deref(), config.dry_run, false).await?;

    let images = config
        .images
        .iter()
        .map(|path| read_artifact(path))
        .collect::<Result<Vec<Artifact>>>()?;
    if let Some(first) = images.first() {
        studio.open(first.clone()).await;
    }
    let staged = if images.len() >= 2 { images } else { Vec::new() };
    let mask = config.mask.as_deref().map(read_artifact).transpose()?;

    let settings = OperationSettings {
        aspect_ratio: config.aspect_ratio.clone(),
        resolution: config.upscale,
        seed: config.seed,
        image_count: config.count,
    };
    let mut action = UserAction::new(config.instruction.clone())
        .with_staged_images(staged)
        .with_settings(settings);
    action.mask = mask;
    action.tool = config.tool;

    let outcome = perform_with_console(&studio, action).await?;
    report_outcome(&config.out_dir, &outcome)?;

    if config.verbose {
        let stats = studio.client_statistics().await;
        println!(
            "   {} remote call(s), {} attempt(s), {} reauth",
            stats.total_calls, stats.total_attempts, stats.reauth_attempts
        );
    }
    Ok(())
}

#[derive(Default)]
struct PendingInputs {
    staged: Vec<Artifact>,
    mask: Option<Artifact>,
}

async fn run_interactive_mode(config: InteractiveConfig) -> Result<()> {
    info!("Running in interactive mode");
    let studio = open_studio(config.config_override.as_deref(), config.dry_run, true).await?;

    if let Some(path) = &config.image {
        studio.open(read_artifact(path)?).await;
    }

    println!(
        "Interactive mode ({} service). Type 'help' for commands.",
        studio.service_name()
    );

    let mut pending = PendingInputs::default();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        let (command, rest) = match input.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        let action = match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                show_interactive_help();
                continue;
            }
            "status" => {
                show_status(&studio, &pending).await;
                continue;
            }
            "undo" => {
                match studio.undo().await {
                    Some(snapshot) => println!("Undo: back to {}", describe(&snapshot.instruction)),
                    None => println!("Undo: nothing loaded"),
                }
                continue;
            }
            "redo" => {
                match studio.redo().await {
                    Some(snapshot) => {
                        println!("Redo: forward to {}", describe(&snapshot.instruction))
                    }
                    None => println!("Redo: nothing to redo"),
                }
                continue;
            }
            "new" => {
                studio.new_document().await;
                pending = PendingInputs::default();
                println!("Started a new document");
                continue;
            }
            "open" | "stage" | "mask" => {
                match read_artifact(Path::new(rest)) {
                    Ok(artifact) => match command {
                        "open" => {
                            studio.open(artifact).await;
                            pending = PendingInputs::default();
                            println!("Opened {}", rest);
                        }
                        "stage" => {
                            pending.staged.push(artifact);
                            println!("{} image(s) staged", pending.staged.len());
                        }
                        _ => {
                            pending.mask = Some(artifact);
                            println!("Mask set");
                        }
                    },
                    Err(e) => println!("Error: {:#}", e),
                }
                continue;
            }
            "save" => {
                match studio.current().await.and_then(|snapshot| snapshot.artifact) {
                    Some(artifact) => {
                        let stem = if rest.is_empty() { "current" } else { rest };
                        match write_artifact(&config.out_dir, stem, &artifact) {
                            Ok(path) => println!("Saved {}", path.display()),
                            Err(e) => println!("Error: {:#}", e),
                        }
                    }
                    None => println!("Nothing to save"),
                }
                continue;
            }
            "history" => {
                print_history(&studio).await;
                continue;
            }
            "restore" => {
                let (id, index) = parse_item_ref(rest);
                match studio.restore_from_history(id, index).await {
                    Some(_) => println!("Restored {} result {}", id, index + 1),
                    None => println!("No such history item"),
                }
                continue;
            }
            "filter" => {
                let (item, name) = rest.rsplit_once(' ').unwrap_or((rest, ""));
                let (id, index) = parse_item_ref(item);
                match FilterKind::parse(name) {
                    Some(filter) => match studio.apply_filter(id, index, filter).await {
                        Ok(()) => println!("Applied {} to {} result {}", name, id, index + 1),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("Unknown filter '{}'", name),
                }
                continue;
            }
            "redeem" => {
                if studio.redeem(rest).await {
                    println!("Code accepted, {} left today", studio.quota_remaining().await);
                } else {
                    println!("Unknown code");
                }
                continue;
            }
            "upscale" => {
                let factor = if rest == "4" {
                    UpscaleFactor::X4
                } else {
                    UpscaleFactor::X2
                };
                UserAction::new("")
                    .with_tool(ToolAction::Upscale)
                    .with_settings(OperationSettings {
                        resolution: Some(factor),
                        ..Default::default()
                    })
            }
            "refine" | "reframe" | "animate" => match ToolAction::parse(command) {
                Some(tool) => UserAction::new(rest).with_tool(tool),
                None => continue,
            },
            _ => UserAction::new(input),
        };

        let action = UserAction {
            staged_images: std::mem::take(&mut pending.staged),
            mask: pending.mask.take(),
            ..action
        };

        match perform_with_console(&studio, action).await {
            Ok(outcome) => {
                if let Err(e) = report_outcome(&config.out_dir, &outcome) {
                    println!("Error: {:#}", e);
                }
            }
            Err(e) => {
                error!("Action failed: {}", e);
                println!("Error: {}", e);
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn show_interactive_help() {
    println!("Interactive Mode Commands:");
    println!("  open <file>      - Open an image as a new document");
    println!("  stage <file>     - Stage an image for combining");
    println!("  mask <file>      - Use a mask for the next edit");
    println!("  upscale [2|4]    - Upscale the current image");
    println!("  refine <text>    - Refine the current image");
    println!("  reframe <text>   - Reframe the current image");
    println!("  animate <text>   - Turn the current image into a short video");
    println!("  undo / redo      - Step through this session's edits");
    println!("  save [name]      - Write the current image to the output directory");
    println!("  history          - List past results");
    println!("  restore <id> [n] - Reopen result n of a history record");
    println!("  filter <id> [n] <grayscale|sepia|vivid|cool|warm>");
    println!("                   - Tag a history result with a filter");
    println!("  redeem <code>    - Redeem a bonus code");
    println!("  new              - Start a new document");
    println!("  status           - Show session, quota and call statistics");
    println!("  quit / exit      - Exit the application");
    println!("\nAny other text generates, edits, inpaints or combines as appropriate.");
}

/// `"<id> [n]"` with a 1-based result number, defaulting to the first result
fn parse_item_ref(input: &str) -> (&str, usize) {
    let mut parts = input.split_whitespace();
    let id = parts.next().unwrap_or("");
    let index = parts
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .map(|n| n.saturating_sub(1))
        .unwrap_or(0);
    (id, index)
}

fn describe(instruction: &str) -> &str {
    if instruction.is_empty() {
        "(opened image)"
    } else {
        instruction
    }
}

async fn show_status(studio: &StudioSystem, pending: &PendingInputs) {
    let position = match studio.session_state().await {
        StackState::Empty => "empty".to_string(),
        StackState::At(i) => format!("step {}", i + 1),
    };
    let stats = studio.client_statistics().await;

    println!("\nStatus:");
    println!("  Document: {}", position);
    println!(
        "  Staged: {} image(s), mask {}",
        pending.staged.len(),
        if pending.mask.is_some() { "set" } else { "unset" }
    );
    println!("  Quota: {} video generation(s) left today", studio.quota_remaining().await);
    println!(
        "  Calls: {} total, {} attempts, {} errors, {} reauth",
        stats.total_calls, stats.total_attempts, stats.total_errors, stats.reauth_attempts
    );
}

async fn print_history(studio: &StudioSystem) {
    let records = studio.history().await;
    if records.is_empty() {
        println!("No history yet");
        return;
    }

    for record in records {
        let instruction: String = record.instruction.chars().take(60).collect();
        let marks: Vec<String> = record
            .results
            .iter()
            .filter_map(|item| match (item.applied_upscale, item.applied_filter) {
                (Some(factor), _) => Some(format!("x{}", factor.multiplier())),
                (None, Some(filter)) => Some(format!("{:?}", filter).to_lowercase()),
                (None, None) => None,
            })
            .collect();

        println!(
            "{}  {}  {:<8} {} result(s){}  {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.operation_kind,
            record.results.len(),
            if marks.is_empty() {
                String::new()
            } else {
                format!(" [{}]", marks.join(", "))
            },
            instruction
        );
    }
}

async fn run_history_command(config_override: Option<PathBuf>, action: HistoryAction) -> Result<()> {
    let studio = open_studio(config_override.as_deref(), true, false).await?;

    match action {
        HistoryAction::List => print_history(&studio).await,
        HistoryAction::Remove(ids) => {
            if studio.remove_history(&ids).await {
                println!("Removed {} record(s)", ids.len());
            } else {
                anyhow::bail!("Could not update the history store");
            }
        }
        HistoryAction::Clear => {
            if studio.clear_history().await {
                println!("History cleared");
            } else {
                anyhow::bail!("Could not clear the history store");
            }
        }
    }
    Ok(())
}

async fn run_quota_command(config_override: Option<PathBuf>, action: QuotaAction) -> Result<()> {
    let studio = open_studio(config_override.as_deref(), true, false).await?;
    let allotment = studio.config().quota.daily_allotment;

    match action {
        QuotaAction::Show => {
            println!(
                "{} of {} video generation(s) left today",
                studio.quota_remaining().await,
                allotment
            );
        }
        QuotaAction::Redeem(code) => {
            if studio.redeem(&code).await {
                println!("Code accepted, {} left today", studio.quota_remaining().await);
            } else {
                anyhow::bail!("Unknown redemption code '{}'", code);
            }
        }
    }
    Ok(())
}
