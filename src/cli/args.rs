//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Perform one action (generate, edit, inpaint, combine or a tool)
//! - `interactive`: Edit in a prompt loop with undo/redo
//! - `history`: List, remove or clear past results
//! - `quota`: Show the daily allowance or redeem a code
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::router::ToolAction;
use crate::service::types::UpscaleFactor;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    Interactive(InteractiveConfig),
    History {
        config_override: Option<PathBuf>,
        action: HistoryAction,
    },
    Quota {
        config_override: Option<PathBuf>,
        action: QuotaAction,
    },
    ShowConfig,
    InitConfig,
}

#[derive(Debug)]
pub struct RunConfig {
    pub instruction: String,
    pub images: Vec<PathBuf>,
    pub mask: Option<PathBuf>,
    pub tool: Option<ToolAction>,
    pub aspect_ratio: Option<String>,
    pub seed: Option<u64>,
    pub count: u32,
    pub upscale: Option<UpscaleFactor>,
    pub out_dir: PathBuf,
    pub config_override: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct InteractiveConfig {
    pub image: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub config_override: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    List,
    Remove(Vec<String>),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaAction {
    Show,
    Redeem(String),
}

#[derive(Debug, Parser)]
#[command(name = "genstudio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and edit images and short videos with a generative media service")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Perform one action and write the results
    Run {
        /// What to generate or change
        instruction: String,
        /// Input image; the first one is opened, two or more are staged for combining
        #[arg(short = 'i', long = "image", value_name = "FILE")]
        images: Vec<PathBuf>,
        /// Mask image marking the region to inpaint
        #[arg(short = 'm', long = "mask", value_name = "FILE")]
        mask: Option<PathBuf>,
        /// Explicit tool: upscale, refine, reframe or animate
        #[arg(short = 't', long = "tool")]
        tool: Option<String>,
        /// Aspect ratio such as 16:9
        #[arg(long = "aspect-ratio")]
        aspect_ratio: Option<String>,
        /// Seed for reproducible output
        #[arg(long = "seed")]
        seed: Option<u64>,
        /// Number of results to request
        #[arg(long = "count", default_value_t = 1)]
        count: u32,
        /// Upscale factor for the upscale tool (2 or 4)
        #[arg(long = "factor")]
        factor: Option<u32>,
        /// Directory results are written to
        #[arg(short = 'o', long = "out", default_value = ".")]
        out: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Use the offline placeholder service
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Edit interactively with undo/redo
    Interactive {
        /// Image to open at start
        #[arg(short = 'i', long = "image", value_name = "FILE")]
        image: Option<PathBuf>,
        /// Directory results are written to
        #[arg(short = 'o', long = "out", default_value = ".")]
        out: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Use the offline placeholder service
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Inspect or prune the activity history
    History {
        #[command(subcommand)]
        action: HistoryCommand,
        /// Configuration file path
        #[arg(short = 'c', long = "config", global = true)]
        config: Option<PathBuf>,
    },
    /// Show the daily allowance or redeem a code
    Quota {
        #[command(subcommand)]
        action: QuotaCommand,
        /// Configuration file path
        #[arg(short = 'c', long = "config", global = true)]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration file to ~/.genstudio/config.toml
    InitConfig,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List past results, newest first
    List,
    /// Remove records by id
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Remove every record
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum QuotaCommand {
    /// Show remaining metered operations for today
    Show,
    /// Redeem a bonus code
    Redeem { code: String },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                instruction,
                images,
                mask,
                tool,
                aspect_ratio,
                seed,
                count,
                factor,
                out,
                config,
                dry_run,
                verbose,
            }) => {
                let tool = tool.as_deref().map(Self::parse_tool).transpose()?;
                let upscale = factor.map(Self::parse_factor).transpose()?;
                if *count == 0 {
                    return Err("--count must be at least 1".to_string());
                }

                Ok(ExecutionMode::Run(RunConfig {
                    instruction: instruction.clone(),
                    images: images.clone(),
                    mask: mask.clone(),
                    tool,
                    aspect_ratio: aspect_ratio.clone(),
                    seed: *seed,
                    count: *count,
                    upscale,
                    out_dir: out.clone(),
                    config_override: config.clone(),
                    dry_run: *dry_run,
                    verbose: *verbose,
                }))
            }
            Some(Commands::Interactive {
                image,
                out,
                config,
                dry_run,
                verbose,
            }) => Ok(ExecutionMode::Interactive(InteractiveConfig {
                image: image.clone(),
                out_dir: out.clone(),
                config_override: config.clone(),
                dry_run: *dry_run,
                verbose: *verbose,
            })),
            Some(Commands::History { action, config }) => Ok(ExecutionMode::History {
                config_override: config.clone(),
                action: match action {
                    HistoryCommand::List => HistoryAction::List,
                    HistoryCommand::Remove { ids } => HistoryAction::Remove(ids.clone()),
                    HistoryCommand::Clear => HistoryAction::Clear,
                },
            }),
            Some(Commands::Quota { action, config }) => Ok(ExecutionMode::Quota {
                config_override: config.clone(),
                action: match action {
                    QuotaCommand::Show => QuotaAction::Show,
                    QuotaCommand::Redeem { code } => QuotaAction::Redeem(code.clone()),
                },
            }),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'genstudio --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    fn parse_tool(name: &str) -> Result<ToolAction, String> {
        ToolAction::parse(name).ok_or_else(|| {
            format!(
                "Unknown tool '{}'. Expected one of: upscale, refine, reframe, animate",
                name
            )
        })
    }

    fn parse_factor(factor: u32) -> Result<UpscaleFactor, String> {
        match factor {
            2 => Ok(UpscaleFactor::X2),
            4 => Ok(UpscaleFactor::X4),
            other => Err(format!("Unsupported upscale factor {}, use 2 or 4", other)),
        }
    }
}
