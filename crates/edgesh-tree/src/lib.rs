//! Command tree for edgesh.
//!
//! The tree is a read-only, n-ary hierarchy of invocable commands. The REPL
//! engine resolves token sequences against it with longest-prefix matching
//! (`CommandTree::find`), inspects per-node flags for completion and
//! namespace injection, and dispatches through `CommandTree::execute`.

pub mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Failure talking to the remote configuration API.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("api returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no api endpoint configured")]
    NotConfigured,
}

/// Structured command failures, mapped to process exit codes.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Api(#[from] BackendError),
    #[error("{0}")]
    Io(String),
}

impl TreeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            TreeError::UnknownCommand(_) => 127,
            TreeError::Usage(_) => 2,
            TreeError::Api(_) | TreeError::Io(_) => 1,
        }
    }
}

// =============================================================================
// Remote API boundary
// =============================================================================

/// The remote configuration API, treated as a black box: an HTTP verb and a
/// path in, a JSON body out.
pub trait Backend: Send + Sync {
    fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, BackendError>;
}

// =============================================================================
// Nodes, flags, completion specs
// =============================================================================

/// A named flag a node accepts. `short` is the single-character form.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    pub long: String,
    pub short: Option<char>,
    pub help: String,
    pub takes_value: bool,
    pub hidden: bool,
}

impl FlagSpec {
    pub fn new(long: &str, short: Option<char>, help: &str) -> Self {
        FlagSpec {
            long: long.to_string(),
            short,
            help: help.to_string(),
            takes_value: true,
            hidden: false,
        }
    }
}

/// How positional arguments of a node are completed.
///
/// Dynamic variants are interpreted by the completion engine through its
/// cache; the tree itself never issues network calls.
#[derive(Debug, Clone)]
pub enum ArgSpec {
    None,
    /// Fixed `(value, description)` pairs.
    Static(Vec<(String, String)>),
    /// Live namespace names from the registry API.
    Namespaces,
    /// Live resource names of the given type in the active namespace.
    ResourceNames { resource: String },
}

/// One flag-parsed invocation handed to a leaf runner.
#[derive(Debug)]
pub struct Invocation {
    pub args: Vec<String>,
    pub flags: BTreeMap<String, String>,
}

impl Invocation {
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// Namespace for the request, defaulting like the server does.
    pub fn namespace(&self) -> &str {
        self.flag("namespace").unwrap_or("default")
    }
}

type Runner = Arc<dyn Fn(&Invocation) -> Result<(), TreeError> + Send + Sync>;

/// One node in the command tree.
pub struct CommandNode {
    pub name: String,
    pub about: String,
    pub aliases: Vec<String>,
    pub hidden: bool,
    pub flags: Vec<FlagSpec>,
    pub arg_spec: ArgSpec,
    children: Vec<CommandNode>,
    runner: Option<Runner>,
}

impl CommandNode {
    pub fn new(name: &str, about: &str) -> Self {
        CommandNode {
            name: name.to_string(),
            about: about.to_string(),
            aliases: Vec::new(),
            hidden: false,
            flags: Vec::new(),
            arg_spec: ArgSpec::None,
            children: Vec::new(),
            runner: None,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn flag(mut self, spec: FlagSpec) -> Self {
        self.flags.push(spec);
        self
    }

    pub fn arg_spec(mut self, spec: ArgSpec) -> Self {
        self.arg_spec = spec;
        self
    }

    pub fn child(mut self, node: CommandNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<(), TreeError> + Send + Sync + 'static,
    {
        self.runner = Some(Arc::new(f));
        self
    }

    pub fn children(&self) -> &[CommandNode] {
        &self.children
    }

    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }

    pub fn has_flag(&self, long: &str) -> bool {
        self.flags.iter().any(|f| f.long == long)
    }

    fn find_child(&self, token: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.matches(token))
    }
}

// =============================================================================
// The tree
// =============================================================================

/// The root of the command hierarchy plus flags every node inherits.
pub struct CommandTree {
    root: CommandNode,
    pub global_flags: Vec<FlagSpec>,
}

impl CommandTree {
    pub fn new(root: CommandNode, global_flags: Vec<FlagSpec>) -> Self {
        CommandTree { root, global_flags }
    }

    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Longest-prefix match: walks children while tokens name a child, then
    /// returns the deepest node reached and the unconsumed tokens.
    pub fn find<'a>(&'a self, tokens: &[String]) -> (&'a CommandNode, Vec<String>) {
        let mut node = &self.root;
        let mut idx = 0;
        while idx < tokens.len() {
            match node.find_child(&tokens[idx]) {
                Some(child) => {
                    node = child;
                    idx += 1;
                }
                None => break,
            }
        }
        (node, tokens[idx..].to_vec())
    }

    /// True when the tokens name a real command path (deeper than root).
    pub fn resolves(&self, tokens: &[String]) -> bool {
        if tokens.is_empty() {
            return false;
        }
        let (node, _) = self.find(tokens);
        !std::ptr::eq(node, &self.root)
    }

    /// Flags visible on `node`: its own plus the inherited globals.
    pub fn flags_for<'a>(&'a self, node: &'a CommandNode) -> Vec<&'a FlagSpec> {
        let mut out: Vec<&FlagSpec> = node.flags.iter().collect();
        out.extend(self.global_flags.iter());
        out
    }

    /// Executes a fully-qualified token sequence. Errors are printed to
    /// stderr by the caller; this returns the structured failure.
    pub fn run(&self, tokens: &[String]) -> Result<(), TreeError> {
        if tokens.is_empty() {
            return Err(TreeError::Usage("no command given".to_string()));
        }
        let (node, remaining) = self.find(tokens);
        if std::ptr::eq(node, &self.root) {
            return Err(TreeError::UnknownCommand(tokens[0].clone()));
        }
        let runner = match &node.runner {
            Some(r) => Arc::clone(r),
            None => {
                // A group node: requires one of its subcommands.
                let subs: Vec<&str> = node
                    .children
                    .iter()
                    .filter(|c| !c.hidden)
                    .map(|c| c.name.as_str())
                    .collect();
                return Err(TreeError::Usage(format!(
                    "`{}` requires a subcommand (one of: {})",
                    node.name,
                    subs.join(", ")
                )));
            }
        };
        let invocation = self.parse_invocation(node, &remaining)?;
        runner(&invocation)
    }

    /// Executes and maps the outcome to an exit code, reporting failures on
    /// stderr. This is the dispatch surface the REPL uses.
    pub fn execute(&self, tokens: &[String]) -> i32 {
        match self.run(tokens) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {e}");
                e.exit_code()
            }
        }
    }

    fn lookup_flag<'a>(&'a self, node: &'a CommandNode, token: &str) -> Option<&'a FlagSpec> {
        let all = self.flags_for(node);
        if let Some(long) = token.strip_prefix("--") {
            return all.into_iter().find(|f| f.long == long);
        }
        let short = token.strip_prefix('-')?;
        let mut chars = short.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        all.into_iter().find(|f| f.short == Some(c))
    }

    fn parse_invocation(
        &self,
        node: &CommandNode,
        remaining: &[String],
    ) -> Result<Invocation, TreeError> {
        let mut args = Vec::new();
        let mut flags = BTreeMap::new();
        let mut i = 0;
        while i < remaining.len() {
            let token = &remaining[i];
            if token.starts_with('-') && token.len() > 1 {
                let (head, inline) = match token.split_once('=') {
                    Some((h, v)) => (h.to_string(), Some(v.to_string())),
                    None => (token.clone(), None),
                };
                let spec = self
                    .lookup_flag(node, &head)
                    .ok_or_else(|| TreeError::Usage(format!("unknown flag: {head}")))?;
                let value = if !spec.takes_value {
                    "true".to_string()
                } else if let Some(v) = inline {
                    v
                } else {
                    i += 1;
                    remaining
                        .get(i)
                        .cloned()
                        .ok_or_else(|| TreeError::Usage(format!("flag {head} needs a value")))?
                };
                flags.insert(spec.long.clone(), value);
            } else {
                args.push(token.clone());
            }
            i += 1;
        }
        Ok(Invocation { args, flags })
    }
}
