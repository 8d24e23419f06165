//! The interactive shell: session state and the read-eval loop.
//!
//! One `Session` lives for the process lifetime. The loop owns it
//! exclusively; the completion helper only ever sees read-only snapshots
//! refreshed before each prompt.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::Editor;

use edgesh_tree::registry::build_tree;
use edgesh_tree::{Backend, CommandTree};

use crate::api::{extract_tenant, HttpApi, RegistryClient};
use crate::completion::{
    CompletionCache, CompletionEngine, ContextSnapshot, ShellHelper, CACHE_TTL,
};
use crate::config::ShellConfig;
use crate::context::{ContextPath, ContextValidator};
use crate::history::{HistoryStore, DEFAULT_MAX_SIZE};
use crate::prompt;
use crate::resolver::{execute_line, Flow};

/// Per-process shell state. Owned by the single REPL thread.
pub struct Session {
    pub config: ShellConfig,
    pub tenant: String,
    pub namespace: String,
    pub last_exit_code: i32,
    pub context: ContextPath,
    pub validator: ContextValidator,
    pub history: HistoryStore,
    pub tree: Arc<CommandTree>,
    pub api: Arc<dyn RegistryClient>,
    pub cache: Arc<RwLock<CompletionCache>>,
}

impl Session {
    pub fn new(config: ShellConfig, tree: Arc<CommandTree>, api: Arc<dyn RegistryClient>) -> Self {
        let tenant = extract_tenant(&config.api_url);
        let namespace = config.namespace.clone();
        let mut history = HistoryStore::new(config.history_path.clone(), DEFAULT_MAX_SIZE);
        if let Err(e) = history.load() {
            tracing::warn!(path = %history.path().display(), error = %e, "could not load history");
            eprintln!("Warning: could not load history: {e}");
        }
        Session {
            config,
            tenant,
            namespace,
            last_exit_code: 0,
            context: ContextPath::default(),
            validator: ContextValidator,
            history,
            tree,
            api,
            cache: Arc::new(RwLock::new(CompletionCache::new(CACHE_TTL))),
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            tenant: self.tenant.clone(),
            domain: self.context.domain().map(str::to_string),
            action: self.context.action().map(str::to_string),
            namespace: self.namespace.clone(),
        }
    }
}

/// Runs the shell to completion and returns the final exit code.
pub fn run(config: ShellConfig) -> Result<i32> {
    let api = Arc::new(HttpApi::new(&config)?);
    let backend: Arc<dyn Backend> = api.clone();
    let tree = Arc::new(build_tree(backend));
    let registry: Arc<dyn RegistryClient> = api;

    let mut session = Session::new(config, Arc::clone(&tree), registry);

    prompt::print_banner(&session.tenant, &session.config.api_url);

    let snapshot = Arc::new(RwLock::new(session.snapshot()));
    let engine = CompletionEngine::new(
        Arc::clone(&tree),
        Arc::clone(&session.api),
        Arc::clone(&snapshot),
        Arc::clone(&session.cache),
    );
    let helper = ShellHelper::new(engine, Arc::clone(&snapshot), session.config.color);

    let mut rl: Editor<ShellHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init line editor: {e}"))?;
    rl.set_helper(Some(helper));
    for entry in session.history.entries() {
        let _ = rl.add_history_entry(entry);
    }

    let mut last_interrupt: Option<Instant> = None;

    loop {
        {
            let mut snap = snapshot.write().unwrap_or_else(|e| e.into_inner());
            *snap = session.snapshot();
        }
        let prompt_text = prompt::plain_prompt(&session.snapshot());

        match rl.readline(&prompt_text) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(trimmed);
                }
                match execute_line(&mut session, &line) {
                    Flow::Continue => {}
                    Flow::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Double Ctrl+C within half a second exits.
                let now = Instant::now();
                if let Some(prev) = last_interrupt {
                    if now.duration_since(prev) < Duration::from_millis(500) {
                        break;
                    }
                }
                last_interrupt = Some(now);
                println!("Press Ctrl+C again to exit, or continue typing");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        }
    }

    if let Err(e) = session.history.save() {
        tracing::warn!(error = %e, "failed to save history");
        eprintln!("Warning: failed to save history: {e}");
    }
    println!("Goodbye!");
    Ok(session.last_exit_code)
}
