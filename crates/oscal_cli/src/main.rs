use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use entity_model::{derive_uuid, Document, DocumentKind, LinkRelation, OwnerKind};
use entity_store::{EntityStore, Loaded, StoreConfig};
use oscal_model::load_document_from_file;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "oscal", about = "Compliance document store", version)]
struct Cli {
    /// SQLite database path (defaults to OSCAL_STORE_DB or ./oscal_store.sqlite).
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a JSON document and store it.
    Ingest {
        /// Path to the document JSON.
        file: String,
        /// Overwrite a stored document with the same id.
        #[arg(long)]
        replace: bool,
    },

    /// Re-encode a stored document as JSON.
    Export {
        #[arg(value_parser = parse_kind)]
        kind: DocumentKind,
        id: Uuid,
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<String>,
        /// Print only the root row body.
        #[arg(long)]
        root_only: bool,
    },

    /// Delete a stored document and everything it owns.
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: DocumentKind,
        id: Uuid,
    },

    /// List stored documents of one kind.
    List {
        #[arg(value_parser = parse_kind)]
        kind: DocumentKind,
    },

    /// Print the identity derived from key=value attributes.
    DeriveId {
        #[arg(long = "attr", value_parser = parse_kv, required = true)]
        attrs: Vec<(String, String)>,
    },

    /// Register a component known by a descriptive identifier.
    RegisterComponent {
        /// e.g. components/common/ssh
        identifier: String,
        #[arg(long = "attr", value_parser = parse_kv)]
        attrs: Vec<(String, String)>,
    },

    /// List inventory items implementing a component.
    Implementers { component: Uuid },
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let mut config = StoreConfig::from_env();
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }

    let result = match cli.command {
        Commands::Ingest { file, replace } => cmd_ingest(&config, &file, replace),
        Commands::Export { kind, id, out, root_only } => cmd_export(&config, kind, id, out.as_deref(), root_only),
        Commands::Delete { kind, id } => cmd_delete(&config, kind, id),
        Commands::List { kind } => cmd_list(&config, kind),
        Commands::DeriveId { attrs } => cmd_derive_id(attrs),
        Commands::RegisterComponent { identifier, attrs } => cmd_register_component(&config, &identifier, attrs),
        Commands::Implementers { component } => cmd_implementers(&config, component),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<EntityStore> {
    EntityStore::open(config).with_context(|| format!("opening store at {}", config.db_path))
}

fn cmd_ingest(config: &StoreConfig, file: &str, replace: bool) -> Result<()> {
    let ext = load_document_from_file(file)?;
    let doc = Document::decode(&ext).with_context(|| format!("decoding {}", file))?;
    debug!(file, kind = %doc.kind(), id = %doc.id(), "decoded document");
    let mut store = open_store(config)?;
    if replace {
        store.replace(&doc)?;
    } else {
        store.insert(&doc)?;
    }
    println!("{} {} {}", doc.kind(), doc.id(), doc.title());
    Ok(())
}

fn cmd_export(config: &StoreConfig, kind: DocumentKind, id: Uuid, out: Option<&str>, root_only: bool) -> Result<()> {
    let store = open_store(config)?;
    let json = match store.load_by_id(kind, id, !root_only)? {
        Loaded::Root(row) => serde_json::to_string_pretty(&row.body.0)?,
        Loaded::Document(doc) => doc.encode().to_json_pretty()?,
    };
    match out {
        Some(path) => std::fs::write(path, json + "\n").with_context(|| format!("writing {}", path))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_delete(config: &StoreConfig, kind: DocumentKind, id: Uuid) -> Result<()> {
    let mut store = open_store(config)?;
    let removed = store.delete(kind, id)?;
    if removed == 0 {
        bail!("{} {} not found", kind, id);
    }
    println!("deleted {} {} ({} rows)", kind, id, removed);
    Ok(())
}

fn cmd_list(config: &StoreConfig, kind: DocumentKind) -> Result<()> {
    let store = open_store(config)?;
    for summary in store.list(kind)? {
        println!("{}\t{}", summary.id, summary.title);
    }
    Ok(())
}

fn cmd_derive_id(attrs: Vec<(String, String)>) -> Result<()> {
    println!("{}", derive_uuid(attrs));
    Ok(())
}

fn cmd_register_component(config: &StoreConfig, identifier: &str, attrs: Vec<(String, String)>) -> Result<()> {
    let store = open_store(config)?;
    let attributes: BTreeMap<String, String> = attrs.into_iter().collect();
    let component = store.register_component(identifier, attributes)?;
    println!("{} {}", component.id, component.identifier);
    Ok(())
}

fn cmd_implementers(config: &StoreConfig, component: Uuid) -> Result<()> {
    let store = open_store(config)?;
    for link in store.linked_to(LinkRelation::ImplementedComponent, component)? {
        println!("{}\t{}", link.left_id, link.root_id);
    }
    Ok(())
}

fn parse_kind(s: &str) -> Result<DocumentKind, String> {
    DocumentKind::from_tag(s).map_err(|_| {
        let known: Vec<&str> = DocumentKind::ALL.iter().map(|k| k.tag()).collect();
        format!("unknown document kind '{}', expected one of: {}", s, known.join(", "))
    })
}

fn parse_kv(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err("expected key=value".to_string());
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn kinds_parse_by_tag() {
        assert_eq!(parse_kind("system-security-plan"), Ok(DocumentKind::SystemSecurityPlan));
        let err = parse_kind("ssp").unwrap_err();
        assert!(err.contains("plan-of-action-and-milestones"));
    }

    #[test]
    fn kv_splits_on_first_equals() {
        assert_eq!(parse_kv("a=b=c"), Ok(("a".to_string(), "b=c".to_string())));
        assert!(parse_kv("novalue").is_err());
    }

    #[test]
    fn db_flag_is_global() {
        let cli = Cli::try_parse_from(["oscal", "list", "catalog", "--db", "/tmp/x.sqlite"]).expect("parse");
        assert_eq!(cli.db.as_deref(), Some("/tmp/x.sqlite"));
        assert!(matches!(cli.command, Commands::List { kind: DocumentKind::Catalog }));
    }

    #[test]
    fn derive_id_needs_attributes() {
        assert!(Cli::try_parse_from(["oscal", "derive-id"]).is_err());
        let cli = Cli::try_parse_from(["oscal", "derive-id", "--attr", "name=ssh"]).expect("parse");
        assert!(matches!(cli.command, Commands::DeriveId { ref attrs } if attrs.len() == 1));
    }
}
