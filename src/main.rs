//! gitvault：笔记库与 Git 仓库之间的双向同步
//!
//! ```bash
//! gitvault config set --owner alice --repo notes --token ghp_xxx --vault ~/notes
//! gitvault push
//! gitvault pull --yes
//! ```

use clap::{Parser, Subcommand};
use gitvault_lib::commands::{self, settings::SettingsPatch};
use gitvault_lib::core::SyncDirection;
use gitvault_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use gitvault_lib::{resolve_config_dir, AppState};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "gitvault")]
#[command(version)]
#[command(about = "Two-way sync between a local vault and a Git repository")]
struct Cli {
    /// 配置目录（默认为系统配置目录下的 gitvault）
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make the remote repository match the local vault
    Push {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Write every remote file into the local vault
    Pull {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Forget cached remote file contents
    #[command(name = "clear-cache")]
    ClearCache,

    /// Show recent commits on the default branch
    Commits {
        #[arg(short = 'n', long, default_value_t = commands::commits::DEFAULT_LIMIT)]
        limit: u32,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show or change logging
    Log {
        #[arg(long)]
        enabled: Option<bool>,
        /// error, warn, info, debug or trace
        #[arg(long)]
        level: Option<String>,
        /// 1-100
        #[arg(long)]
        max_size_mb: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print current settings (token masked)
    Show,

    /// Change settings; each change is saved immediately
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Local vault directory
        #[arg(long)]
        vault: Option<String>,
        #[arg(long)]
        api_base: Option<String>,
        /// Directory name to skip, repeatable; replaces the current list
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        #[arg(long)]
        committer_name: Option<String>,
        #[arg(long)]
        committer_email: Option<String>,
    },
}

/// 初始化日志系统
fn init_logging(config_dir: &Path) {
    let log_dir = get_log_dir(config_dir);
    let _ = std::fs::create_dir_all(&log_dir);

    let config = LogConfig::load(config_dir);

    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let subscriber = tracing_subscriber::registry();
        let _ = tracing::subscriber::set_global_default(subscriber);
        return;
    }

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(config.tracing_level().into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if let Ok(file_writer) = SizeRotatingWriter::new(&log_dir, config.max_size_mb) {
        // 文件日志层 - 始终输出到文件
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false);

        // 在 debug 模式下也输出到控制台
        #[cfg(debug_assertions)]
        {
            let console_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer);

            let _ = tracing::subscriber::set_global_default(subscriber);
        }

        #[cfg(not(debug_assertions))]
        {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer);

            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    } else {
        // 文件日志创建失败，回退到控制台
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

async fn sync(state: &AppState, direction: SyncDirection, yes: bool) -> anyhow::Result<()> {
    match commands::sync::run_sync(state, direction, yes).await? {
        Some(report) => println!("{}", commands::sync::summarize(&report)),
        None => println!("已取消"),
    }
    Ok(())
}

async fn run(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Push { yes } => sync(state, SyncDirection::Push, yes).await?,
        Commands::Pull { yes } => sync(state, SyncDirection::Pull, yes).await?,
        Commands::ClearCache => {
            let cleared = commands::cache::clear_cache(state)?;
            println!("已清除 {} 个缓存条目", cleared);
        }
        Commands::Commits { limit } => {
            for commit in commands::commits::recent_commits(state, limit).await? {
                println!("{}", commands::commits::format_commit(&commit));
            }
        }
        Commands::Config { action } => {
            let view = match action {
                ConfigAction::Show => commands::settings::show_settings(state)?,
                ConfigAction::Set {
                    owner,
                    repo,
                    token,
                    vault,
                    api_base,
                    exclude,
                    committer_name,
                    committer_email,
                } => commands::settings::set_settings(
                    state,
                    SettingsPatch {
                        owner,
                        repo,
                        token,
                        vault_path: vault,
                        api_base,
                        exclude_dirs: exclude,
                        committer_name,
                        committer_email,
                    },
                )?,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Log {
            enabled,
            level,
            max_size_mb,
        } => {
            let config = if enabled.is_none() && level.is_none() && max_size_mb.is_none() {
                commands::log::get_log_config(state)
            } else {
                commands::log::set_log_config(state, enabled, max_size_mb, level)?
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = match resolve_config_dir(cli.config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("无法创建配置目录: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config_dir);

    let state = AppState::new(&config_dir);
    let is_sync = matches!(cli.command, Commands::Push { .. } | Commands::Pull { .. });
    match run(&state, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            if is_sync {
                eprintln!("{}: {:#}", commands::sync::describe_failure(&e), e);
            } else {
                eprintln!("错误: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
