//! Tab completion: static context-aware suggestion sets plus on-demand,
//! cached, network-backed lookups.
//!
//! The engine never shares mutable state with the dispatch path; it works
//! from a read-only snapshot of the session refreshed before each prompt.
//! Dynamic lookups go through a TTL cache so repeated keystrokes do not
//! re-issue network calls, and every failure degrades to a static fallback
//! list rather than surfacing to the caller.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use edgesh_tree::{registry, ArgSpec, CommandNode, CommandTree};

use crate::api::RegistryClient;
use crate::context::ContextPath;
use crate::resolver::{prepend_context, tokenize};

pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Read-only view of the session the helper works from.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub tenant: String,
    pub domain: Option<String>,
    pub action: Option<String>,
    pub namespace: String,
}

impl ContextSnapshot {
    fn context_path(&self) -> ContextPath {
        let mut ctx = ContextPath::default();
        if let Some(d) = &self.domain {
            ctx.set_domain(d);
            if let Some(a) = &self.action {
                ctx.set_action(a);
            }
        }
        ctx
    }
}

// =============================================================================
// Cache
// =============================================================================

struct CacheEntry {
    values: Vec<String>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// TTL cache for dynamic completion values. Writes are guarded by the
/// fetch-start timestamp so a slow, stale fetch cannot clobber a newer
/// entry.
pub struct CompletionCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl CompletionCache {
    pub fn new(ttl: Duration) -> Self {
        CompletionCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        let entry = self.entries.get(key)?;
        if Instant::now() < entry.expires_at {
            Some(entry.values.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: &str, values: Vec<String>, fetched_at: Instant) {
        if let Some(existing) = self.entries.get(key) {
            if existing.fetched_at > fetched_at {
                return;
            }
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                values,
                fetched_at,
                expires_at: fetched_at + self.ttl,
            },
        );
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

// =============================================================================
// Suggestions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub desc: String,
}

impl Suggestion {
    fn new(text: &str, desc: &str) -> Self {
        Suggestion {
            text: text.to_string(),
            desc: desc.to_string(),
        }
    }
}

const ACTION_SUGGESTIONS: &[(&str, &str)] = &[
    ("list", "List resources"),
    ("get", "Get a specific resource"),
    ("create", "Create a new resource"),
    ("delete", "Delete a resource"),
    ("replace", "Replace a resource"),
    ("apply", "Apply configuration from file"),
    ("status", "Get resource status"),
    ("patch", "Patch a resource"),
    ("add-labels", "Add labels to a resource"),
    ("remove-labels", "Remove labels from a resource"),
];

const ROOT_BUILTIN_SUGGESTIONS: &[(&str, &str)] = &[
    ("quit", "Exit the shell"),
    ("help", "Show help information"),
    ("clear", "Clear the screen"),
    ("history", "Show command history"),
    ("namespace", "Set default namespace"),
    ("ns", "Set default namespace (alias)"),
    ("context", "Show current context"),
    ("ctx", "Show current context (alias)"),
];

fn filter_prefix(items: Vec<Suggestion>, prefix: &str) -> Vec<Suggestion> {
    if prefix.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|s| s.text.starts_with(prefix))
        .collect()
}

// =============================================================================
// Engine
// =============================================================================

pub struct CompletionEngine {
    tree: Arc<CommandTree>,
    api: Arc<dyn RegistryClient>,
    snapshot: Arc<RwLock<ContextSnapshot>>,
    cache: Arc<RwLock<CompletionCache>>,
}

impl CompletionEngine {
    pub fn new(
        tree: Arc<CommandTree>,
        api: Arc<dyn RegistryClient>,
        snapshot: Arc<RwLock<ContextSnapshot>>,
        cache: Arc<RwLock<CompletionCache>>,
    ) -> Self {
        CompletionEngine {
            tree,
            api,
            snapshot,
            cache,
        }
    }

    /// Suggestions for the partial input before `pos`. Returns the start
    /// offset of the word being completed and the ranked candidates.
    pub fn suggestions(&self, line: &str, pos: usize) -> (usize, Vec<Suggestion>) {
        let before = &line[..pos];
        // Word boundary in bytes; whitespace may be multi-byte (U+00A0).
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let word = &before[start..];
        let tokens = tokenize(&before[..start]);
        let snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let ctx = snapshot.context_path();

        // Flag-name completion for the resolved node.
        if word.starts_with('-') {
            let ctx_tokens = prepend_context(&self.tree, &ctx, tokens);
            let (node, _) = self.tree.find(&ctx_tokens);
            return (start, self.flag_suggestions(node, word));
        }

        // Completing the first word: contextual sets, prefix-filtered.
        if tokens.is_empty() {
            return (start, filter_prefix(self.contextual_suggestions(&ctx), word));
        }

        let ctx_tokens = prepend_context(&self.tree, &ctx, tokens);
        if !self.tree.resolves(&ctx_tokens) {
            return (start, filter_prefix(self.contextual_suggestions(&ctx), word));
        }

        let (node, remaining) = self.tree.find(&ctx_tokens);
        let visible: Vec<&CommandNode> = node.children().iter().filter(|c| !c.hidden).collect();
        if !visible.is_empty() {
            let subs = visible
                .iter()
                .map(|c| Suggestion::new(&c.name, &c.about))
                .collect();
            return (start, filter_prefix(subs, word));
        }

        let dynamic = self.positional_suggestions(node, &ctx_tokens, &remaining, &snapshot);
        (start, filter_prefix(dynamic, word))
    }

    fn contextual_suggestions(&self, ctx: &ContextPath) -> Vec<Suggestion> {
        if ctx.is_root() {
            let mut out: Vec<Suggestion> = registry::DOMAINS
                .iter()
                .map(|d| Suggestion::new(d.name, d.about))
                .collect();
            out.extend(
                ROOT_BUILTIN_SUGGESTIONS
                    .iter()
                    .map(|(t, d)| Suggestion::new(t, d)),
            );
            return out;
        }

        if ctx.is_domain() {
            let mut out: Vec<Suggestion> = ACTION_SUGGESTIONS
                .iter()
                .map(|(t, d)| Suggestion::new(t, d))
                .collect();
            out.push(Suggestion::new("exit", "Go up to root context"));
            out.push(Suggestion::new("back", "Go up to root context"));
            out.push(Suggestion::new("..", "Go up to root context"));
            out.push(Suggestion::new("help", "Show context help"));
            return out;
        }

        // Action context: flags of the current node plus navigation verbs.
        let path: Vec<String> = [ctx.domain(), ctx.action()]
            .iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        let (node, _) = self.tree.find(&path);
        let mut out = self.flag_suggestions(node, "-");
        out.push(Suggestion::new("exit", "Go up to domain context"));
        out.push(Suggestion::new("back", "Go up to domain context"));
        out.push(Suggestion::new("..", "Go up to domain context"));
        out.push(Suggestion::new("root", "Go to root context"));
        out.push(Suggestion::new("/", "Go to root context"));
        out.push(Suggestion::new("help", "Show context help"));
        out
    }

    fn flag_suggestions(&self, node: &CommandNode, prefix: &str) -> Vec<Suggestion> {
        let mut out = Vec::new();
        let locals = node.flags.len();
        for (i, flag) in self.tree.flags_for(node).into_iter().enumerate() {
            if flag.hidden {
                continue;
            }
            let desc = if i >= locals {
                format!("{} (global)", flag.help)
            } else {
                flag.help.clone()
            };
            let long = format!("--{}", flag.long);
            if long.starts_with(prefix) || prefix == "-" || prefix == "--" {
                out.push(Suggestion::new(&long, &desc));
            }
            if let Some(c) = flag.short {
                let short = format!("-{c}");
                if short.starts_with(prefix) || prefix == "-" {
                    out.push(Suggestion::new(&short, &desc));
                }
            }
        }
        out
    }

    fn positional_suggestions(
        &self,
        node: &CommandNode,
        tokens: &[String],
        remaining: &[String],
        snapshot: &ContextSnapshot,
    ) -> Vec<Suggestion> {
        match &node.arg_spec {
            ArgSpec::None => Vec::new(),
            ArgSpec::Static(pairs) => pairs
                .iter()
                .map(|(t, d)| Suggestion::new(t, d))
                .collect(),
            ArgSpec::Namespaces => {
                let values = self.cached_fetch("namespaces", || self.api.list_namespaces());
                match values {
                    Some(names) => names
                        .iter()
                        .map(|n| Suggestion::new(n, "Namespace"))
                        .collect(),
                    None => vec![
                        Suggestion::new("default", "Default namespace"),
                        Suggestion::new("system", "System namespace"),
                    ],
                }
            }
            ArgSpec::ResourceNames { resource } => {
                // A name is the only positional; once one is typed there is
                // nothing left to complete.
                if remaining.iter().any(|t| !t.starts_with('-')) {
                    return Vec::new();
                }
                let namespace = explicit_namespace(tokens)
                    .or_else(|| {
                        if snapshot.namespace.is_empty() {
                            None
                        } else {
                            Some(snapshot.namespace.clone())
                        }
                    })
                    .unwrap_or_else(|| "default".to_string());
                let key = format!("{resource}:{namespace}");
                let values = self.cached_fetch(&key, || {
                    self.api.list_resource_names(resource, &namespace)
                });
                values
                    .unwrap_or_default()
                    .iter()
                    .map(|n| Suggestion::new(n, "Resource name"))
                    .collect()
            }
        }
    }

    /// Serves `key` from the cache, fetching on miss or expiry. Fetch
    /// failures leave the cache untouched and return None.
    fn cached_fetch<F>(&self, key: &str, fetch: F) -> Option<Vec<String>>
    where
        F: FnOnce() -> Result<Vec<String>, edgesh_tree::BackendError>,
    {
        if let Some(values) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Some(values);
        }

        let started = Instant::now();
        match fetch() {
            Ok(values) => {
                self.cache
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key, values.clone(), started);
                Some(values)
            }
            Err(e) => {
                tracing::debug!(key, error = %e, "dynamic completion fetch failed");
                None
            }
        }
    }
}

/// Namespace already present on the command line, in any accepted form.
fn explicit_namespace(tokens: &[String]) -> Option<String> {
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        if t == "-n" || t == "--namespace" {
            return tokens.get(i + 1).cloned();
        }
        if let Some(v) = t.strip_prefix("-n=").or_else(|| t.strip_prefix("--namespace=")) {
            return Some(v.to_string());
        }
        i += 1;
    }
    None
}

// =============================================================================
// rustyline integration
// =============================================================================

pub struct ShellHelper {
    engine: CompletionEngine,
    snapshot: Arc<RwLock<ContextSnapshot>>,
    color: bool,
}

impl ShellHelper {
    pub fn new(
        engine: CompletionEngine,
        snapshot: Arc<RwLock<ContextSnapshot>>,
        color: bool,
    ) -> Self {
        ShellHelper {
            engine,
            snapshot,
            color,
        }
    }
}

impl rustyline::Helper for ShellHelper {}

impl rustyline::completion::Completer for ShellHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, suggestions) = self.engine.suggestions(line, pos);
        let pairs = suggestions
            .into_iter()
            .map(|s| rustyline::completion::Pair {
                display: if s.desc.is_empty() {
                    s.text.clone()
                } else {
                    format!("{:<24} {}", s.text, s.desc)
                },
                replacement: s.text,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl rustyline::hint::Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl rustyline::highlight::Highlighter for ShellHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> std::borrow::Cow<'b, str> {
        if !self.color {
            return std::borrow::Cow::Borrowed(prompt);
        }
        let snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        std::borrow::Cow::Owned(crate::prompt::colored_prompt(&snapshot))
    }
}

impl rustyline::validate::Validator for ShellHelper {}

#[cfg(test)]
mod completion_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use edgesh_tree::registry::build_tree;
    use edgesh_tree::{Backend, BackendError};

    struct NullBackend;

    impl Backend for NullBackend {
        fn request(
            &self,
            _method: &str,
            _path: &str,
            _body: Option<&serde_json::Value>,
        ) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::json!({}))
        }
    }

    struct CountingRegistry {
        fetches: AtomicUsize,
        namespaces: Mutex<Result<Vec<String>, ()>>,
    }

    impl CountingRegistry {
        fn ok(names: &[&str]) -> Arc<Self> {
            Arc::new(CountingRegistry {
                fetches: AtomicUsize::new(0),
                namespaces: Mutex::new(Ok(names.iter().map(|s| s.to_string()).collect())),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(CountingRegistry {
                fetches: AtomicUsize::new(0),
                namespaces: Mutex::new(Err(())),
            })
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl RegistryClient for CountingRegistry {
        fn list_namespaces(&self) -> Result<Vec<String>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.namespaces
                .lock()
                .unwrap()
                .clone()
                .map_err(|_| BackendError::Transport("down".to_string()))
        }

        fn list_resource_names(
            &self,
            _resource: &str,
            _namespace: &str,
        ) -> Result<Vec<String>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["web-lb".to_string(), "api-lb".to_string()])
        }
    }

    fn engine_with(
        api: Arc<CountingRegistry>,
        snapshot: ContextSnapshot,
        ttl: Duration,
    ) -> CompletionEngine {
        CompletionEngine::new(
            Arc::new(build_tree(Arc::new(NullBackend))),
            api,
            Arc::new(RwLock::new(snapshot)),
            Arc::new(RwLock::new(CompletionCache::new(ttl))),
        )
    }

    fn texts(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn empty_input_at_root_offers_domains_and_builtins() {
        let engine = engine_with(CountingRegistry::ok(&[]), ContextSnapshot::default(), CACHE_TTL);
        let (_, got) = engine.suggestions("", 0);
        let names = texts(&got);
        assert!(names.contains(&"http_loadbalancer"));
        assert!(names.contains(&"quit"));
        assert!(names.contains(&"ctx"));
    }

    #[test]
    fn empty_input_in_domain_offers_actions_and_navigation() {
        let snapshot = ContextSnapshot {
            domain: Some("http_loadbalancer".to_string()),
            ..Default::default()
        };
        let engine = engine_with(CountingRegistry::ok(&[]), snapshot, CACHE_TTL);
        let (_, got) = engine.suggestions("", 0);
        let names = texts(&got);
        assert!(names.contains(&"list"));
        assert!(names.contains(&"add-labels"));
        assert!(names.contains(&".."));
        assert!(!names.contains(&"http_loadbalancer"));
    }

    #[test]
    fn empty_input_in_action_context_offers_flags() {
        let snapshot = ContextSnapshot {
            domain: Some("http_loadbalancer".to_string()),
            action: Some("list".to_string()),
            ..Default::default()
        };
        let engine = engine_with(CountingRegistry::ok(&[]), snapshot, CACHE_TTL);
        let (_, got) = engine.suggestions("", 0);
        let names = texts(&got);
        assert!(names.contains(&"--namespace"));
        assert!(names.contains(&"root"));
    }

    #[test]
    fn dash_prefix_completes_flags_of_resolved_node() {
        let snapshot = ContextSnapshot {
            domain: Some("http_loadbalancer".to_string()),
            ..Default::default()
        };
        let engine = engine_with(CountingRegistry::ok(&[]), snapshot, CACHE_TTL);
        let line = "list --n";
        let (start, got) = engine.suggestions(line, line.len());
        assert_eq!(start, 5);
        assert_eq!(texts(&got), vec!["--namespace"]);
    }

    #[test]
    fn multibyte_whitespace_is_a_word_boundary() {
        let engine = engine_with(CountingRegistry::ok(&[]), ContextSnapshot::default(), CACHE_TTL);
        for line in ["get\u{a0}", "get\u{3000}na"] {
            let (start, _) = engine.suggestions(line, line.len());
            assert!(line.is_char_boundary(start));
        }
        let line = "namespace\u{a0}ge";
        let (start, got) = engine.suggestions(line, line.len());
        assert_eq!(start, "namespace\u{a0}".len());
        assert_eq!(texts(&got), vec!["get"]);
    }

    #[test]
    fn partial_first_word_filters_contextual_set() {
        let engine = engine_with(CountingRegistry::ok(&[]), ContextSnapshot::default(), CACHE_TTL);
        let (_, got) = engine.suggestions("http_", 5);
        assert_eq!(texts(&got), vec!["http_loadbalancer"]);
    }

    #[test]
    fn resource_name_completion_fetches_through_cache() {
        let api = CountingRegistry::ok(&[]);
        let snapshot = ContextSnapshot {
            domain: Some("http_loadbalancer".to_string()),
            ..Default::default()
        };
        let engine = engine_with(api.clone(), snapshot, CACHE_TTL);
        let line = "get ";
        let (_, got) = engine.suggestions(line, line.len());
        assert_eq!(texts(&got), vec!["web-lb", "api-lb"]);
        // Second keystroke within the TTL window: served from cache.
        let (_, _) = engine.suggestions(line, line.len());
        assert_eq!(api.count(), 1);
    }

    #[test]
    fn resource_name_completion_stops_after_name_present() {
        let api = CountingRegistry::ok(&[]);
        let snapshot = ContextSnapshot {
            domain: Some("http_loadbalancer".to_string()),
            ..Default::default()
        };
        let engine = engine_with(api.clone(), snapshot, CACHE_TTL);
        let line = "get web-lb ";
        let (_, got) = engine.suggestions(line, line.len());
        assert!(got.is_empty());
        assert_eq!(api.count(), 0);
    }

    #[test]
    fn expired_ttl_triggers_exactly_one_more_fetch() {
        let api = CountingRegistry::ok(&["default", "prod"]);
        let engine = engine_with(api.clone(), ContextSnapshot::default(), Duration::ZERO);
        let line = "namespace get ";
        engine.suggestions(line, line.len());
        engine.suggestions(line, line.len());
        assert_eq!(api.count(), 2);
    }

    #[test]
    fn namespace_fetch_failure_falls_back_to_static_list() {
        let api = CountingRegistry::failing();
        let engine = engine_with(api.clone(), ContextSnapshot::default(), CACHE_TTL);
        let line = "namespace get ";
        let (_, got) = engine.suggestions(line, line.len());
        assert_eq!(texts(&got), vec!["default", "system"]);
        // The failure is swallowed and not cached; the next request tries
        // the network again.
        engine.suggestions(line, line.len());
        assert_eq!(api.count(), 2);
    }

    #[test]
    fn cache_ignores_writes_older_than_stored_entry() {
        let mut cache = CompletionCache::new(CACHE_TTL);
        let older = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let newer = Instant::now();
        cache.insert("k", vec!["new".to_string()], newer);
        cache.insert("k", vec!["stale".to_string()], older);
        assert_eq!(cache.get("k"), Some(vec!["new".to_string()]));
    }

    #[test]
    fn invalidate_forces_next_fetch() {
        let api = CountingRegistry::ok(&["default"]);
        let engine = engine_with(api.clone(), ContextSnapshot::default(), CACHE_TTL);
        assert!(engine.cached_fetch("namespaces", || api.list_namespaces()).is_some());
        engine
            .cache
            .write()
            .unwrap()
            .invalidate("namespaces");
        assert!(engine.cached_fetch("namespaces", || api.list_namespaces()).is_some());
        assert_eq!(api.count(), 2);
    }
}
