//! Resource-domain registry and command-tree builder.
//!
//! A domain is a top-level resource category the shell can enter
//! (`http_loadbalancer`, `origin_pool`, ...). Each domain exposes a fixed
//! vocabulary of action subcommands that translate into HTTP calls against
//! the configuration API.

use std::sync::Arc;

use crate::{ArgSpec, Backend, CommandNode, CommandTree, FlagSpec, Invocation, TreeError};

/// Metadata about one resource domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub about: &'static str,
    pub aliases: &'static [&'static str],
    /// Path segment in the API (`http_loadbalancers`).
    pub plural: &'static str,
    /// Whether resources live inside a namespace.
    pub namespaced: bool,
}

pub const DOMAINS: &[DomainInfo] = &[
    DomainInfo {
        name: "http_loadbalancer",
        display_name: "HTTP Load Balancer",
        about: "HTTP and HTTPS load balancing with routing and WAF attachment",
        aliases: &["hlb"],
        plural: "http_loadbalancers",
        namespaced: true,
    },
    DomainInfo {
        name: "tcp_loadbalancer",
        display_name: "TCP Load Balancer",
        about: "TCP and TLS passthrough load balancing",
        aliases: &["tlb"],
        plural: "tcp_loadbalancers",
        namespaced: true,
    },
    DomainInfo {
        name: "origin_pool",
        display_name: "Origin Pool",
        about: "Origin server pools and upstream endpoints",
        aliases: &["pool"],
        plural: "origin_pools",
        namespaced: true,
    },
    DomainInfo {
        name: "healthcheck",
        display_name: "Healthcheck",
        about: "Active health checking for origin pools",
        aliases: &["hc"],
        plural: "healthchecks",
        namespaced: true,
    },
    DomainInfo {
        name: "app_firewall",
        display_name: "App Firewall",
        about: "WAF policies and threat protection",
        aliases: &["waf"],
        plural: "app_firewalls",
        namespaced: true,
    },
    DomainInfo {
        name: "service_policy",
        display_name: "Service Policy",
        about: "L7 service policies and access control rules",
        aliases: &["policy"],
        plural: "service_policys",
        namespaced: true,
    },
    DomainInfo {
        name: "dns_zone",
        display_name: "DNS Zone",
        about: "Authoritative DNS zones and records",
        aliases: &["dns"],
        plural: "dns_zones",
        namespaced: true,
    },
    DomainInfo {
        name: "certificate",
        display_name: "Certificate",
        about: "TLS certificates and trust chains",
        aliases: &["cert"],
        plural: "certificates",
        namespaced: true,
    },
    DomainInfo {
        name: "virtual_site",
        display_name: "Virtual Site",
        about: "Virtual site groupings for placement",
        aliases: &["vsite"],
        plural: "virtual_sites",
        namespaced: true,
    },
    DomainInfo {
        name: "namespace",
        display_name: "Namespace",
        about: "Tenant namespaces and isolation boundaries",
        aliases: &["ns"],
        plural: "namespaces",
        namespaced: false,
    },
];

/// The fixed action vocabulary valid inside a domain context.
pub const ACTIONS: &[&str] = &[
    "list",
    "get",
    "create",
    "replace",
    "apply",
    "delete",
    "status",
    "patch",
    "add-labels",
    "remove-labels",
];

/// Resolves a canonical name or alias to its domain.
pub fn resolve_domain(name: &str) -> Option<&'static DomainInfo> {
    DOMAINS
        .iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
}

pub fn is_action(name: &str) -> bool {
    ACTIONS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ActionKind {
    List,
    Get,
    Create,
    Replace,
    Apply,
    Delete,
    Status,
    Patch,
    AddLabels,
    RemoveLabels,
}

impl ActionKind {
    fn name(self) -> &'static str {
        match self {
            ActionKind::List => "list",
            ActionKind::Get => "get",
            ActionKind::Create => "create",
            ActionKind::Replace => "replace",
            ActionKind::Apply => "apply",
            ActionKind::Delete => "delete",
            ActionKind::Status => "status",
            ActionKind::Patch => "patch",
            ActionKind::AddLabels => "add-labels",
            ActionKind::RemoveLabels => "remove-labels",
        }
    }

    fn about(self, domain: &DomainInfo) -> String {
        match self {
            ActionKind::List => format!("List {} resources", domain.display_name),
            ActionKind::Get => format!("Get a {} by name", domain.display_name),
            ActionKind::Create => format!("Create a {} from a file", domain.display_name),
            ActionKind::Replace => format!("Replace a {} from a file", domain.display_name),
            ActionKind::Apply => format!("Create or update a {} from a file", domain.display_name),
            ActionKind::Delete => format!("Delete a {} by name", domain.display_name),
            ActionKind::Status => format!("Show status of a {}", domain.display_name),
            ActionKind::Patch => format!("Patch a {} from a file", domain.display_name),
            ActionKind::AddLabels => format!("Add labels to a {}", domain.display_name),
            ActionKind::RemoveLabels => format!("Remove labels from a {}", domain.display_name),
        }
    }

    fn needs_name(self) -> bool {
        matches!(
            self,
            ActionKind::Get
                | ActionKind::Delete
                | ActionKind::Status
                | ActionKind::Patch
                | ActionKind::AddLabels
                | ActionKind::RemoveLabels
        )
    }

    fn needs_file(self) -> bool {
        matches!(
            self,
            ActionKind::Create | ActionKind::Replace | ActionKind::Apply | ActionKind::Patch
        )
    }
}

const ALL_ACTIONS: &[ActionKind] = &[
    ActionKind::List,
    ActionKind::Get,
    ActionKind::Create,
    ActionKind::Replace,
    ActionKind::Apply,
    ActionKind::Delete,
    ActionKind::Status,
    ActionKind::Patch,
    ActionKind::AddLabels,
    ActionKind::RemoveLabels,
];

// Namespaces themselves only support the basic lifecycle.
const NAMESPACE_ACTIONS: &[ActionKind] = &[
    ActionKind::List,
    ActionKind::Get,
    ActionKind::Create,
    ActionKind::Delete,
    ActionKind::Status,
];

fn collection_path(domain: &DomainInfo, namespace: &str) -> String {
    if domain.namespaced {
        format!("/api/config/namespaces/{namespace}/{}", domain.plural)
    } else {
        format!("/api/config/{}", domain.plural)
    }
}

fn read_spec_file(inv: &Invocation) -> Result<serde_json::Value, TreeError> {
    let path = inv
        .flag("file")
        .ok_or_else(|| TreeError::Usage("missing required flag: --file".to_string()))?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| TreeError::Io(format!("cannot read {path}: {e}")))?;
    serde_json::from_str(&text).map_err(|e| TreeError::Io(format!("invalid JSON in {path}: {e}")))
}

fn required_name(inv: &Invocation, action: ActionKind) -> Result<String, TreeError> {
    inv.args.first().cloned().ok_or_else(|| {
        TreeError::Usage(format!("{} requires a resource name", action.name()))
    })
}

fn render(body: &serde_json::Value, inv: &Invocation) {
    match inv.flag("output-format").unwrap_or("json") {
        "table" => {
            if let Some(items) = body.get("items").and_then(|v| v.as_array()) {
                for item in items {
                    let name = item
                        .pointer("/metadata/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("(unnamed)");
                    println!("{name}");
                }
                return;
            }
            println!("{body:#}");
        }
        _ => println!("{body:#}"),
    }
}

fn run_action(
    backend: &Arc<dyn Backend>,
    domain: &DomainInfo,
    action: ActionKind,
    inv: &Invocation,
) -> Result<(), TreeError> {
    let collection = collection_path(domain, inv.namespace());
    let body = match action {
        ActionKind::List => backend.request("GET", &collection, None)?,
        ActionKind::Get => {
            let name = required_name(inv, action)?;
            backend.request("GET", &format!("{collection}/{name}"), None)?
        }
        ActionKind::Status => {
            let name = required_name(inv, action)?;
            backend.request("GET", &format!("{collection}/{name}/status"), None)?
        }
        ActionKind::Delete => {
            let name = required_name(inv, action)?;
            backend.request("DELETE", &format!("{collection}/{name}"), None)?
        }
        ActionKind::Create => {
            let spec = read_spec_file(inv)?;
            backend.request("POST", &collection, Some(&spec))?
        }
        ActionKind::Replace | ActionKind::Apply => {
            let spec = read_spec_file(inv)?;
            let name = spec
                .pointer("/metadata/name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| inv.args.first().cloned())
                .ok_or_else(|| {
                    TreeError::Usage("spec file has no metadata.name and no name given".to_string())
                })?;
            backend.request("PUT", &format!("{collection}/{name}"), Some(&spec))?
        }
        ActionKind::Patch => {
            let name = required_name(inv, action)?;
            let spec = read_spec_file(inv)?;
            backend.request("POST", &format!("{collection}/{name}/patch"), Some(&spec))?
        }
        ActionKind::AddLabels | ActionKind::RemoveLabels => {
            let name = required_name(inv, action)?;
            let labels: Vec<&str> = inv.args.iter().skip(1).map(String::as_str).collect();
            if labels.is_empty() {
                return Err(TreeError::Usage(format!(
                    "{} requires at least one label",
                    action.name()
                )));
            }
            let payload = serde_json::json!({ "labels": labels });
            let verb = if action == ActionKind::AddLabels {
                "add-labels"
            } else {
                "remove-labels"
            };
            backend.request("POST", &format!("{collection}/{name}/{verb}"), Some(&payload))?
        }
    };
    render(&body, inv);
    Ok(())
}

fn action_node(
    backend: &Arc<dyn Backend>,
    domain: &'static DomainInfo,
    action: ActionKind,
) -> CommandNode {
    let mut node = CommandNode::new(action.name(), &action.about(domain));
    if domain.namespaced {
        node = node.flag(FlagSpec::new(
            "namespace",
            Some('n'),
            "Namespace to operate in",
        ));
    }
    if action.needs_file() {
        node = node.flag(FlagSpec::new("file", Some('f'), "Resource spec file (JSON)"));
    }
    if action.needs_name() {
        // Namespace names come from the dedicated registry endpoint; every
        // other domain lists resources of its own type.
        let spec = if domain.name == "namespace" {
            ArgSpec::Namespaces
        } else {
            ArgSpec::ResourceNames {
                resource: domain.name.to_string(),
            }
        };
        node = node.arg_spec(spec);
    }
    let backend = Arc::clone(backend);
    node.run(move |inv| run_action(&backend, domain, action, inv))
}

/// Builds the full command tree over the given API backend.
pub fn build_tree(backend: Arc<dyn Backend>) -> CommandTree {
    let mut root = CommandNode::new("edgesh", "Interactive shell for the edge configuration API");

    for domain in DOMAINS {
        let mut dnode = CommandNode::new(domain.name, domain.about);
        for alias in domain.aliases {
            dnode = dnode.alias(alias);
        }
        let actions = if domain.namespaced {
            ALL_ACTIONS
        } else {
            NAMESPACE_ACTIONS
        };
        for action in actions {
            dnode = dnode.child(action_node(&backend, domain, *action));
        }
        root = root.child(dnode);
    }

    root = root.child(
        CommandNode::new("version", "Show client version").run(|_| {
            println!("edgesh {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }),
    );

    let global_flags = vec![FlagSpec {
        long: "output-format".to_string(),
        short: Some('o'),
        help: "Output format: json or table".to_string(),
        takes_value: true,
        hidden: false,
    }];

    CommandTree::new(root, global_flags)
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBackend {
        calls: Mutex<Vec<(String, String)>>,
        response: serde_json::Value,
    }

    impl RecordingBackend {
        fn new(response: serde_json::Value) -> Arc<Self> {
            Arc::new(RecordingBackend {
                calls: Mutex::new(Vec::new()),
                response,
            })
        }
    }

    impl Backend for RecordingBackend {
        fn request(
            &self,
            method: &str,
            path: &str,
            _body: Option<&serde_json::Value>,
        ) -> Result<serde_json::Value, crate::BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), path.to_string()));
            Ok(self.response.clone())
        }
    }

    fn toks(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn resolve_domain_accepts_aliases() {
        assert_eq!(resolve_domain("ns").unwrap().name, "namespace");
        assert_eq!(resolve_domain("hlb").unwrap().name, "http_loadbalancer");
        assert_eq!(
            resolve_domain("http_loadbalancer").unwrap().name,
            "http_loadbalancer"
        );
        assert!(resolve_domain("not_a_domain").is_none());
    }

    #[test]
    fn list_hits_namespace_scoped_collection() {
        let backend = RecordingBackend::new(serde_json::json!({"items": []}));
        let tree = build_tree(backend.clone());
        assert_eq!(
            tree.execute(&toks(&["http_loadbalancer", "list", "-n", "shared"])),
            0
        );
        let calls = backend.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "GET".to_string(),
                "/api/config/namespaces/shared/http_loadbalancers".to_string()
            )
        );
    }

    #[test]
    fn namespace_domain_is_tenant_scoped_and_has_no_namespace_flag() {
        let backend = RecordingBackend::new(serde_json::json!({"items": []}));
        let tree = build_tree(backend.clone());
        let (node, _) = tree.find(&toks(&["namespace", "list"]));
        assert!(!node.has_flag("namespace"));
        assert_eq!(tree.execute(&toks(&["namespace", "list"])), 0);
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].1, "/api/config/namespaces");
    }

    #[test]
    fn get_requires_a_name() {
        let backend = RecordingBackend::new(serde_json::json!({}));
        let tree = build_tree(backend);
        assert_eq!(tree.execute(&toks(&["origin_pool", "get"])), 2);
    }

    #[test]
    fn alias_path_resolves_like_canonical() {
        let backend = RecordingBackend::new(serde_json::json!({"items": []}));
        let tree = build_tree(backend.clone());
        assert_eq!(tree.execute(&toks(&["pool", "list"])), 0);
        let calls = backend.calls.lock().unwrap();
        assert_eq!(
            calls[0].1,
            "/api/config/namespaces/default/origin_pools"
        );
    }
}
