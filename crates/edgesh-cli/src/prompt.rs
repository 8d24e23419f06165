//! Prompt and banner rendering.
//!
//! Prompt format: `tenant:domain/action@namespace> `, with segments omitted
//! when unset. The colored variant is produced only for the line editor's
//! prompt highlighting; everything else renders the plain form.

use colored::Colorize;

use crate::completion::ContextSnapshot;

fn tenant_segment(tenant: &str) -> Option<&str> {
    if tenant.is_empty() || tenant == "unknown" || tenant == "local" {
        None
    } else {
        Some(tenant)
    }
}

pub fn plain_prompt(snapshot: &ContextSnapshot) -> String {
    let mut prompt = String::new();

    if let Some(tenant) = tenant_segment(&snapshot.tenant) {
        prompt.push_str(tenant);
    }

    if let Some(domain) = &snapshot.domain {
        if !prompt.is_empty() {
            prompt.push(':');
        }
        prompt.push_str(domain);
        if let Some(action) = &snapshot.action {
            prompt.push('/');
            prompt.push_str(action);
        }
    }

    if !snapshot.namespace.is_empty() {
        prompt.push('@');
        prompt.push_str(&snapshot.namespace);
    }

    if prompt.is_empty() {
        return "edgesh> ".to_string();
    }
    prompt.push_str("> ");
    prompt
}

pub fn colored_prompt(snapshot: &ContextSnapshot) -> String {
    let mut prompt = String::new();

    if let Some(tenant) = tenant_segment(&snapshot.tenant) {
        prompt.push_str(&tenant.cyan().to_string());
    }

    if let Some(domain) = &snapshot.domain {
        if !prompt.is_empty() {
            prompt.push(':');
        }
        prompt.push_str(&domain.green().to_string());
        if let Some(action) = &snapshot.action {
            prompt.push('/');
            prompt.push_str(&action.yellow().to_string());
        }
    }

    if !snapshot.namespace.is_empty() {
        prompt.push('@');
        prompt.push_str(&snapshot.namespace.magenta().to_string());
    }

    if prompt.is_empty() {
        return format!("{}> ", "edgesh".bold());
    }
    prompt.push_str("> ");
    prompt
}

pub fn print_banner(tenant: &str, api_url: &str) {
    println!("{}", "edgesh".bold().cyan());
    println!("Interactive shell for the edge configuration API");
    if let Some(t) = tenant_segment(tenant) {
        println!("Tenant:   {t}");
    }
    if api_url.is_empty() {
        println!(
            "{}",
            "No API endpoint configured; set EDGESH_API_URL or pass --api-url.".yellow()
        );
    } else {
        println!("Endpoint: {api_url}");
    }
    println!("Type `help` for commands, Tab to complete, `quit` to leave.");
    println!();
}

#[cfg(test)]
mod prompt_tests {
    use super::*;

    fn snapshot(
        tenant: &str,
        domain: Option<&str>,
        action: Option<&str>,
        namespace: &str,
    ) -> ContextSnapshot {
        ContextSnapshot {
            tenant: tenant.to_string(),
            domain: domain.map(str::to_string),
            action: action.map(str::to_string),
            namespace: namespace.to_string(),
        }
    }

    #[test]
    fn full_context_renders_every_segment() {
        let s = snapshot("acme", Some("http_loadbalancer"), Some("list"), "prod");
        assert_eq!(plain_prompt(&s), "acme:http_loadbalancer/list@prod> ");
    }

    #[test]
    fn unset_segments_are_omitted() {
        assert_eq!(
            plain_prompt(&snapshot("acme", None, None, "")),
            "acme> "
        );
        assert_eq!(
            plain_prompt(&snapshot("", Some("dns_zone"), None, "")),
            "dns_zone> "
        );
        assert_eq!(
            plain_prompt(&snapshot("", None, None, "prod")),
            "@prod> "
        );
    }

    #[test]
    fn everything_unset_falls_back_to_program_name() {
        assert_eq!(plain_prompt(&snapshot("", None, None, "")), "edgesh> ");
        assert_eq!(plain_prompt(&snapshot("local", None, None, "")), "edgesh> ");
        assert_eq!(plain_prompt(&snapshot("unknown", None, None, "")), "edgesh> ");
    }
}
