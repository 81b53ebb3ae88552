//! CLI struct definitions and dispatch for the `charter` binary.
//!
//! Every command prints a JSON envelope on stdout; human-oriented
//! summaries go through `core::output`.

use crate::core::config::CharterConfig;
use crate::core::error::CharterError;
use crate::core::store::Store;
use crate::core::time::command_envelope;
use crate::core::{db, output};
use crate::engine::{embedding, evaluator, log, polarity, principles, tenants};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "charter",
    version = env!("CARGO_PKG_VERSION"),
    about = "Charter is a local-first, multi-tenant principle-compliance engine: policy statements carry semantic embeddings, tenants see their own enabled subset, and every evaluation leaves an audit trail. 🦀"
)]
pub struct Cli {
    /// Store root directory holding charter.db and charter.toml.
    #[clap(long, default_value = ".charter", global = true)]
    pub store: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage canonical principles.
    Principle {
        #[clap(subcommand)]
        command: PrincipleCommand,
    },
    /// Manage tenants and their principle links.
    Tenant {
        #[clap(subcommand)]
        command: TenantCommand,
    },
    /// Evaluate an action against a tenant's in-effect principles.
    Evaluate {
        /// Action text. Repeatable for batch evaluation.
        #[clap(long, required = true, num_args = 1..)]
        action: Vec<String>,
        /// Tenant id or slug. Omit for a system-wide evaluation.
        #[clap(long)]
        tenant: Option<String>,
        /// Free-form JSON attached to the evaluation log entry.
        #[clap(long)]
        metadata: Option<String>,
    },
    /// Inspect the append-only evaluation log.
    Log {
        #[clap(subcommand)]
        command: LogCommand,
    },
    /// Report store counts and embedding coverage.
    Status,
}

#[derive(Subcommand, Debug)]
pub enum PrincipleCommand {
    /// Create a principle and embed it.
    Add {
        #[clap(long)]
        text: String,
        #[clap(long)]
        category: String,
    },
    /// List globally active principles.
    List {
        #[clap(long)]
        category: Option<String>,
    },
    /// Retire a principle (kept for audit history).
    Deactivate {
        #[clap(long)]
        id: String,
    },
    /// Embed active principles that lack a current vector.
    Embed,
    /// Semantic search over the global active set.
    Search {
        #[clap(long)]
        query: String,
        #[clap(long, default_value_t = 10)]
        limit: usize,
        /// Override the configured match threshold.
        #[clap(long)]
        threshold: Option<f64>,
    },
    /// Bulk-create principles from a JSON file of {body, category} entries.
    Seed {
        #[clap(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum TenantCommand {
    Add {
        #[clap(long)]
        name: String,
        #[clap(long)]
        slug: String,
    },
    List,
    /// Enable a principle for a tenant (idempotent).
    Link {
        #[clap(long)]
        tenant: String,
        #[clap(long)]
        principle: String,
    },
    /// Disable a principle for a tenant (link row retained).
    Unlink {
        #[clap(long)]
        tenant: String,
        #[clap(long)]
        principle: String,
    },
    /// Show the tenant's in-effect principle set.
    Principles {
        #[clap(long)]
        tenant: String,
    },
    /// Hard-delete a tenant. Evaluation history survives with the
    /// tenant reference nulled.
    Remove {
        #[clap(long)]
        tenant: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Evaluations for one tenant, oldest first.
    List {
        #[clap(long)]
        tenant: Option<String>,
        #[clap(long)]
        since: Option<String>,
        #[clap(long)]
        until: Option<String>,
    },
    /// Most recent evaluations across all tenants.
    Recent {
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Accept either a tenant id or a slug on the command line.
fn resolve_tenant(store: &Store, reference: &str) -> Result<tenants::Tenant, CharterError> {
    match tenants::get_tenant(store, reference) {
        Ok(t) => Ok(t),
        Err(CharterError::NotFound(_)) => tenants::get_tenant_by_slug(store, reference),
        Err(e) => Err(e),
    }
}

fn print_envelope(cmd: &str, extra: serde_json::Value) {
    let env = command_envelope(cmd, "ok", extra);
    println!("{}", serde_json::to_string_pretty(&env).unwrap_or_default());
}

pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let store = Store::at(&cli.store);
    db::initialize_db(&store.root)?;
    let cfg = CharterConfig::load(&store.root)?;
    let provider = embedding::provider_from_config(&cfg)?;

    match cli.command {
        Command::Principle { command } => match command {
            PrincipleCommand::Add { text, category } => {
                let principle = principles::create_principle(&store, &text, &category)?;
                let vector = embedding::embed_with_timeout(
                    &provider,
                    &principle.body,
                    cfg.provider_timeout(),
                )?;
                principles::set_embedding(&store, &cfg, &principle.id, &vector)?;
                print_envelope(
                    "principle.add",
                    serde_json::json!({ "id": principle.id, "category": principle.category }),
                );
            }
            PrincipleCommand::List { category } => {
                let list = principles::list_active(&store, category.as_deref())?;
                for p in &list {
                    let marker = if p.embedding.is_some() { "●" } else { "○" };
                    println!(
                        "{} {} [{}] {}",
                        marker,
                        p.id.dimmed(),
                        p.category.cyan(),
                        output::compact_line(&p.body, 80)
                    );
                }
                print_envelope("principle.list", serde_json::json!({ "count": list.len() }));
            }
            PrincipleCommand::Deactivate { id } => {
                principles::deactivate(&store, &id)?;
                print_envelope("principle.deactivate", serde_json::json!({ "id": id }));
            }
            PrincipleCommand::Embed => {
                let updated = principles::reembed_missing(&store, &cfg, &provider)?;
                print_envelope("principle.embed", serde_json::json!({ "updated": updated }));
            }
            PrincipleCommand::Search {
                query,
                limit,
                threshold,
            } => {
                let threshold = threshold.unwrap_or(cfg.matching.threshold);
                let hits = principles::search_principles(
                    &store, &cfg, &provider, &query, limit, threshold,
                )?;
                for hit in &hits {
                    println!(
                        "{} {} {}",
                        output::render_similarity(hit.similarity, threshold),
                        hit.principle.id.dimmed(),
                        output::compact_line(&hit.principle.body, 70)
                    );
                }
                print_envelope("principle.search", serde_json::json!({ "hits": hits.len() }));
            }
            PrincipleCommand::Seed { file } => {
                let raw = std::fs::read_to_string(&file)?;
                let entries: Vec<principles::SeedEntry> = serde_json::from_str(&raw)?;
                let report = principles::seed_principles(&store, &cfg, &provider, &entries)?;
                print_envelope("principle.seed", serde_json::to_value(&report)?);
            }
        },
        Command::Tenant { command } => match command {
            TenantCommand::Add { name, slug } => {
                let tenant = tenants::create_tenant(&store, &name, &slug)?;
                print_envelope(
                    "tenant.add",
                    serde_json::json!({ "id": tenant.id, "slug": tenant.slug }),
                );
            }
            TenantCommand::List => {
                let list = tenants::list_tenants(&store)?;
                for t in &list {
                    println!("{} {} ({})", t.id.dimmed(), t.name.bold(), t.slug);
                }
                print_envelope("tenant.list", serde_json::json!({ "count": list.len() }));
            }
            TenantCommand::Link { tenant, principle } => {
                let tenant = resolve_tenant(&store, &tenant)?;
                tenants::link_principle(&store, &tenant.id, &principle)?;
                print_envelope(
                    "tenant.link",
                    serde_json::json!({ "tenant": tenant.id, "principle": principle }),
                );
            }
            TenantCommand::Unlink { tenant, principle } => {
                let tenant = resolve_tenant(&store, &tenant)?;
                tenants::unlink_principle(&store, &tenant.id, &principle)?;
                print_envelope(
                    "tenant.unlink",
                    serde_json::json!({ "tenant": tenant.id, "principle": principle }),
                );
            }
            TenantCommand::Principles { tenant } => {
                let tenant = resolve_tenant(&store, &tenant)?;
                let list = tenants::active_principles_for(&store, &tenant.id)?;
                for p in &list {
                    println!(
                        "{} [{}] {}",
                        p.id.dimmed(),
                        p.category.cyan(),
                        output::compact_line(&p.body, 80)
                    );
                }
                print_envelope(
                    "tenant.principles",
                    serde_json::json!({ "tenant": tenant.id, "count": list.len() }),
                );
            }
            TenantCommand::Remove { tenant } => {
                let tenant = resolve_tenant(&store, &tenant)?;
                tenants::remove_tenant(&store, &tenant.id)?;
                print_envelope("tenant.remove", serde_json::json!({ "tenant": tenant.id }));
            }
        },
        Command::Evaluate {
            action,
            tenant,
            metadata,
        } => {
            let tenant_id = match tenant {
                Some(ref t) => Some(resolve_tenant(&store, t)?.id),
                None => None,
            };
            let metadata: Option<serde_json::Value> = match metadata {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            };
            let classifier = polarity::classifier_from_config(&cfg);
            let results = evaluator::evaluate_batch(
                &store,
                &cfg,
                &provider,
                classifier.as_ref(),
                tenant_id.as_deref(),
                &action,
                metadata,
            )?;
            for result in &results {
                let score = result
                    .score
                    .map(|s| format!("{:.4}", s))
                    .unwrap_or_else(|| "unknown".to_string());
                let headline = format!(
                    "score {} | {} matched | {} violations",
                    score,
                    result.matched.len(),
                    result.violations.len()
                );
                if result.violations.is_empty() {
                    println!("{}", headline.green());
                } else {
                    println!("{}", headline.red());
                }
                for v in &result.violations {
                    println!("  ✗ {}", output::compact_line(&v.body, 90).red());
                }
                for r in &result.recommendations {
                    println!("  → {}", r.yellow());
                }
            }
            print_envelope("evaluate", serde_json::json!({ "results": results }));
        }
        Command::Log { command } => match command {
            LogCommand::List {
                tenant,
                since,
                until,
            } => {
                let tenant_id = match tenant {
                    Some(ref t) => Some(resolve_tenant(&store, t)?.id),
                    None => None,
                };
                let rows = log::query_by_tenant(
                    &store,
                    tenant_id.as_deref(),
                    since.as_deref(),
                    until.as_deref(),
                )?;
                print_envelope("log.list", serde_json::json!({ "rows": rows }));
            }
            LogCommand::Recent { limit } => {
                let rows = log::recent(&store, limit)?;
                print_envelope("log.recent", serde_json::json!({ "rows": rows }));
            }
        },
        Command::Status => {
            let all = principles::list_active(&store, None)?;
            let embedded = all.iter().filter(|p| p.embedding.is_some()).count();
            let tenant_rows = tenants::list_tenants(&store)?;
            let evaluations = log::count(&store)?;
            print_envelope(
                "status",
                serde_json::json!({
                    "provider": provider.name(),
                    "dimensions": cfg.embedding.dimensions,
                    "threshold": cfg.matching.threshold,
                    "principles_active": all.len(),
                    "principles_embedded": embedded,
                    "tenants": tenant_rows.len(),
                    "evaluations": evaluations,
                }),
            );
        }
    }
    Ok(())
}
