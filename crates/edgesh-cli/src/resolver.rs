//! Command resolution: the REPL's dispatch state machine.
//!
//! Every input line goes through the same pipeline: tokenize, record in
//! history, then try in priority order
//!
//!   1. navigation verbs (exit / back / .. / root / "/", domain and action
//!      entry),
//!   2. shell builtins (quit, help, clear, history, namespace, context),
//!   3. context-aware dispatch against the command tree, after context
//!      prefixing and default-namespace injection.
//!
//! Navigation winning over dispatch means a tree path that shares a name
//! with a domain or action cannot be invoked bare from inside a context;
//! the leading-slash escape (`/list ...`) is the supported way around it.

use colored::Colorize;

use edgesh_tree::{CommandTree, FlagSpec};

use crate::context::ContextPath;
use crate::repl::Session;

/// What the read loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Splits a line into shell-like tokens. Single and double quotes delimit
/// literal runs (the opposite quote inside a run is taken literally); an
/// unterminated quote consumes to end of line. Never fails.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match c {
            '"' | '\'' => match quote {
                Some(q) if q == c => quote = None,
                Some(_) => current.push(c),
                None => quote = Some(c),
            },
            c if c.is_whitespace() && quote.is_none() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

// =============================================================================
// Line execution
// =============================================================================

/// Runs one input line against the session. The exit code of whatever the
/// line resolved to lands in `session.last_exit_code`.
pub fn execute_line(session: &mut Session, line: &str) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    session.history.add(line);

    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Flow::Continue;
    }

    if let Some(flow) = handle_navigation(session, &tokens) {
        session.last_exit_code = 0;
        return flow;
    }

    if let Some(builtin) = Builtin::parse(&tokens[0]) {
        match builtin.execute(session, &tokens[1..]) {
            Ok(flow) => {
                session.last_exit_code = 0;
                return flow;
            }
            Err(e) => {
                eprintln!("{} {e}", "Error:".red().bold());
                session.last_exit_code = 1;
                return Flow::Continue;
            }
        }
    }

    let rewritten = prepend_context(&session.tree, &session.context, tokens);
    let final_tokens = inject_namespace(&session.tree, &session.namespace, rewritten);
    tracing::debug!(tokens = ?final_tokens, "dispatching to command tree");
    session.last_exit_code = session.tree.execute(&final_tokens);
    Flow::Continue
}

/// Navigation verbs take priority over everything else. The fixed verbs
/// match on the first token; domain and action entry require the token to
/// be the whole line, so `http_loadbalancer list -n shared` dispatches
/// instead of swallowing the arguments.
fn handle_navigation(session: &mut Session, tokens: &[String]) -> Option<Flow> {
    let cmd = tokens[0].as_str();
    match cmd {
        "exit" => {
            if session.context.is_root() {
                return Some(Flow::Exit);
            }
            session.context.navigate_up();
            Some(Flow::Continue)
        }
        "back" | ".." => {
            if !session.context.navigate_up() {
                println!("Already at root context");
            }
            Some(Flow::Continue)
        }
        "root" | "/" => {
            session.context.reset();
            Some(Flow::Continue)
        }
        _ => {
            if tokens.len() != 1 {
                return None;
            }
            if session.context.is_root() && session.validator.is_valid_domain(cmd) {
                let canonical = session.validator.resolve_domain(cmd).unwrap_or(cmd);
                let canonical = canonical.to_string();
                session.context.set_domain(&canonical);
                return Some(Flow::Continue);
            }
            if session.context.is_domain() && session.validator.is_valid_action(cmd) {
                session.context.set_action(cmd);
                return Some(Flow::Continue);
            }
            None
        }
    }
}

// =============================================================================
// Context prefixing and namespace injection
// =============================================================================

/// Rewrites under-specified tokens into a fully-qualified command path.
///
/// A leading `/` escapes to root-relative. Tokens that already resolve to a
/// tree node pass through unchanged, so a full command typed inside a
/// context is not double-prefixed.
pub fn prepend_context(tree: &CommandTree, ctx: &ContextPath, tokens: Vec<String>) -> Vec<String> {
    if tokens.is_empty() {
        return tokens;
    }

    if let Some(stripped) = tokens[0].strip_prefix('/') {
        let mut out: Vec<String> = Vec::new();
        if !stripped.is_empty() {
            out.push(stripped.to_string());
        }
        out.extend(tokens.into_iter().skip(1));
        return out;
    }

    if ctx.is_root() {
        return tokens;
    }

    if tree.resolves(&tokens) {
        return tokens;
    }

    let mut prefixed: Vec<String> = Vec::new();
    if let Some(domain) = ctx.domain() {
        prefixed.push(domain.to_string());
    }
    if let Some(action) = ctx.action() {
        prefixed.push(action.to_string());
    }
    prefixed.extend(tokens);
    prefixed
}

/// Appends `-n <namespace>` when a default namespace is set, the command
/// does not already carry one, and the target node declares the flag.
/// Unresolvable targets pass through untouched.
pub fn inject_namespace(tree: &CommandTree, namespace: &str, tokens: Vec<String>) -> Vec<String> {
    if namespace.is_empty() || tokens.is_empty() {
        return tokens;
    }

    for token in &tokens {
        if token == "-n" || token == "--namespace" {
            return tokens;
        }
        if token.starts_with("-n=") || token.starts_with("--namespace=") {
            return tokens;
        }
    }

    if !tree.resolves(&tokens) {
        return tokens;
    }
    let (node, _) = tree.find(&tokens);
    if !node.has_flag("namespace") {
        return tokens;
    }

    let mut out = tokens;
    out.push("-n".to_string());
    out.push(namespace.to_string());
    out
}

// =============================================================================
// Builtins
// =============================================================================

/// Shell verbs handled without touching the command tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Quit,
    Help,
    Clear,
    History,
    Namespace,
    Context,
}

impl Builtin {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "quit" => Some(Builtin::Quit),
            "help" => Some(Builtin::Help),
            "clear" => Some(Builtin::Clear),
            "history" => Some(Builtin::History),
            "namespace" | "ns" => Some(Builtin::Namespace),
            "context" | "ctx" => Some(Builtin::Context),
            _ => None,
        }
    }

    pub fn execute(self, session: &mut Session, args: &[String]) -> anyhow::Result<Flow> {
        match self {
            Builtin::Quit => Ok(Flow::Exit),
            Builtin::Help => {
                cmd_help(session, args);
                Ok(Flow::Continue)
            }
            Builtin::Clear => {
                // Home cursor, wipe screen and scrollback.
                print!("\x1b[H\x1b[2J\x1b[3J");
                Ok(Flow::Continue)
            }
            Builtin::History => {
                for (i, entry) in session.history.entries().iter().enumerate() {
                    println!("{:4}  {entry}", i + 1);
                }
                Ok(Flow::Continue)
            }
            Builtin::Namespace => cmd_namespace(session, args),
            Builtin::Context => {
                cmd_context(session);
                Ok(Flow::Continue)
            }
        }
    }
}

fn value_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn cmd_context(session: &Session) {
    let ctx = &session.context;
    println!("Current Context:");
    println!("  Tenant:    {}", value_or(&session.tenant, "(not set)"));
    println!(
        "  Domain:    {}",
        value_or(ctx.domain().unwrap_or(""), "(root)")
    );
    println!(
        "  Action:    {}",
        value_or(ctx.action().unwrap_or(""), "(none)")
    );
    println!("  Namespace: {}", value_or(&session.namespace, "(not set)"));
    println!("  Path:      {}", value_or(&ctx.path_string(), "/"));
}

fn cmd_namespace(session: &mut Session, args: &[String]) -> anyhow::Result<Flow> {
    if args.is_empty() {
        if session.namespace.is_empty() {
            println!("No default namespace set");
        } else {
            println!("Default namespace: {}", session.namespace);
        }
        return Ok(Flow::Continue);
    }

    let requested = args[0].clone();

    // Validate against the live registry when reachable; a dead API should
    // not make the builtin unusable.
    match session.api.list_namespaces() {
        Ok(names) => {
            if !names.iter().any(|n| n == &requested) {
                anyhow::bail!("namespace '{requested}' does not exist");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "namespace validation skipped");
            eprintln!("Warning: could not validate namespace: {e}");
        }
    }

    session.namespace = requested.clone();
    session
        .cache
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .invalidate("namespaces");
    println!("Default namespace set to: {requested}");
    Ok(Flow::Continue)
}

fn cmd_help(session: &Session, args: &[String]) {
    if !args.is_empty() {
        print_tree_help(&session.tree, args);
        return;
    }

    let ctx = &session.context;
    if ctx.is_domain() {
        let domain = ctx.domain().unwrap_or("");
        println!();
        println!("Context: {}", ctx.path_string());
        println!();
        println!("Available actions in '{domain}':");
        println!("  list              List resources");
        println!("  get <name>        Get a specific resource");
        println!("  create            Create a new resource");
        println!("  delete <name>     Delete a resource");
        println!("  replace           Replace a resource");
        println!("  apply             Apply configuration from file");
        println!("  status <name>     Get resource status");
        println!();
        println!("Navigation:");
        println!("  exit, back, ..    Return to root");
        println!("  <action>          Enter action context");
        println!();
        println!("Example: list -n production");
        return;
    }
    if ctx.is_action() {
        println!();
        println!("Action: {}", ctx.path_string());
        println!();
        println!("Commands execute with this context prepended.");
        println!("Use flags and arguments directly.");
        println!();
        println!("Navigation:");
        println!("  exit, back, ..    Return to domain context");
        println!("  root, /           Return to root");
        println!();
        println!("Example: -n production -o json");
        return;
    }

    println!(
        r#"
edgesh Interactive Shell

Context Navigation:
  <domain>          Enter a domain context (e.g., http_loadbalancer)
  <action>          Enter action context when in domain (e.g., list, create)
  exit              Go up one level (or exit shell at root)
  back, ..          Go up one level
  root, /           Return to root context
  quit              Exit shell immediately (bypass context)

Built-in Commands:
  help [command]    Show help for a command
  clear             Clear the screen
  history           Show command history
  namespace <ns>    Set default namespace (alias: ns)
  context           Show current context info (alias: ctx)

Keyboard Shortcuts:
  Tab               Auto-complete commands and arguments
  Ctrl+D            Exit the shell
  Up/Down           Navigate command history

Prompt Format: tenant:domain/action@namespace>
"#
    );
}

fn print_flag(flag: &FlagSpec, global: bool) {
    if flag.hidden {
        return;
    }
    let short = match flag.short {
        Some(c) => format!("-{c}, "),
        None => "    ".to_string(),
    };
    let suffix = if global { " (global)" } else { "" };
    println!("  {short}--{:<18} {}{suffix}", flag.long, flag.help);
}

fn print_tree_help(tree: &CommandTree, args: &[String]) {
    let tokens: Vec<String> = args.to_vec();
    let (node, _) = tree.find(&tokens);
    println!("{}", node.about);
    let visible: Vec<_> = node.children().iter().filter(|c| !c.hidden).collect();
    if !visible.is_empty() {
        println!();
        println!("Subcommands:");
        for child in visible {
            println!("  {:<20} {}", child.name, child.about);
        }
    }
    if !node.flags.is_empty() || !tree.global_flags.is_empty() {
        println!();
        println!("Flags:");
        for flag in &node.flags {
            print_flag(flag, false);
        }
        for flag in &tree.global_flags {
            print_flag(flag, true);
        }
    }
}
