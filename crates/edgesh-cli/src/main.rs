//! edgesh: interactive shell for the edge configuration API.
//!
//! With no arguments on a terminal the binary enters the REPL; with a
//! command it dispatches once through the command tree and exits with the
//! command's exit code.

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};

use edgesh_tree::registry::build_tree;
use edgesh_tree::Backend;

mod api;
mod completion;
mod config;
mod context;
mod history;
mod prompt;
mod repl;
mod resolver;

use config::ShellConfig;

#[derive(Parser)]
#[command(name = "edgesh")]
#[command(author, version, about = "Interactive shell for the edge configuration API")]
struct Cli {
    /// Base URL of the configuration API
    #[arg(long, env = "EDGESH_API_URL", default_value = "")]
    api_url: String,

    /// Default namespace for namespace-scoped commands
    #[arg(long, env = "EDGESH_NAMESPACE", default_value = "")]
    namespace: String,

    /// Request timeout in seconds for dispatched commands
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Command to run non-interactively (omit to enter the shell)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn shell_config(cli: &Cli) -> ShellConfig {
    let color = !cli.no_color
        && std::env::var_os("NO_COLOR").is_none()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
        && std::io::stdout().is_terminal();
    ShellConfig {
        api_url: cli.api_url.clone(),
        api_token: std::env::var("EDGESH_API_TOKEN").ok().filter(|t| !t.is_empty()),
        namespace: cli.namespace.clone(),
        request_timeout: Duration::from_secs(cli.timeout),
        completion_timeout: Duration::from_secs(3),
        color,
        history_path: ShellConfig::history_path_default(),
    }
}

fn should_enter_repl(cli: &Cli) -> bool {
    cli.command.is_empty()
        && std::io::stdin().is_terminal()
        && std::env::var_os("EDGESH_NON_INTERACTIVE").is_none()
}

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_env("EDGESH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = shell_config(&cli);
    if !config.color {
        colored::control::set_override(false);
    }

    if should_enter_repl(&cli) {
        return match repl::run(config) {
            Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        };
    }

    if cli.command.is_empty() {
        let _ = Cli::command().print_help();
        return ExitCode::from(2);
    }

    let api = match api::HttpApi::new(&config) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let backend: Arc<dyn Backend> = api;
    let tree = build_tree(backend);
    let code = tree.execute(&cli.command);
    ExitCode::from(code.clamp(0, 255) as u8)
}
