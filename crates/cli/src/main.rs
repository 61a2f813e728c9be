//! Headless driver for formwork schemas.
//!
//! Loads the data-only JSON representation of a schema, mounts a form
//! runtime against it, and prints the resulting field set -- optionally
//! after applying scripted value changes through the runtime (awaiting
//! linkage effects), which is the quickest way to watch a schema's linkage
//! behave without a UI host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use formwork_runtime::{FormRuntime, RenderedField, RendererRegistry};
use formwork_schema::{Schema, ValueMap};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Formwork schema-driven form toolchain.
#[derive(Parser)]
#[command(name = "formwork", version, about = "Formwork schema-driven form toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the nodes of a schema file
    Inspect {
        /// Path to the schema JSON file
        schema: PathBuf,
    },

    /// Render the active visible field set for a schema
    Render {
        /// Path to the schema JSON file
        schema: PathBuf,
        /// Path to a values JSON file applied before rendering
        #[arg(long)]
        values: Option<PathBuf>,
    },

    /// Apply value changes through the runtime and print the outcome
    Apply {
        /// Path to the schema JSON file
        schema: PathBuf,
        /// Path to a values JSON file applied before the changes
        #[arg(long)]
        values: Option<PathBuf>,
        /// A change to apply, as field=json (repeatable, applied in order)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { schema } => {
            let schema = load_schema(&schema);
            inspect(&schema, cli.output);
        }
        Commands::Render { schema, values } => {
            let schema = load_schema(&schema);
            let form = mount(schema, values.as_deref());
            print_fields(&form.render().await, cli.output);
        }
        Commands::Apply {
            schema,
            values,
            set,
        } => {
            let schema = load_schema(&schema);
            let form = mount(schema, values.as_deref());
            for change in &set {
                let (field, value) = parse_change(change);
                form.set_value(&field, value).await;
            }
            print_outcome(&form.values(), &form.render().await, cli.output);
        }
    }
}

fn load_schema(path: &Path) -> Schema {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("error: {} is not valid JSON: {}", path.display(), e);
            process::exit(1);
        }
    };
    match Schema::from_json(&doc) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("error: invalid schema: {}", e);
            process::exit(1);
        }
    }
}

fn mount(schema: Schema, values: Option<&Path>) -> FormRuntime {
    let registry = Arc::new(RendererRegistry::with_defaults());
    let form = FormRuntime::new(schema, registry);
    match values {
        Some(path) => {
            let initial = load_values(path);
            form.with_initial_values(initial)
        }
        None => form,
    }
}

fn load_values(path: &Path) -> ValueMap {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&text) {
        Ok(values) => values,
        Err(e) => {
            eprintln!("error: {} must be a JSON object of values: {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Parse a `field=json` change. A right-hand side that is not valid JSON is
/// taken as a bare string, so `--set city=beijing` works without quoting.
fn parse_change(change: &str) -> (String, serde_json::Value) {
    let Some((field, raw)) = change.split_once('=') else {
        eprintln!("error: --set expects FIELD=VALUE, got '{}'", change);
        process::exit(1);
    };
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    (field.to_string(), value)
}

fn inspect(schema: &Schema, output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let fields: Vec<serde_json::Value> = schema
                .fields()
                .iter()
                .map(|field| {
                    serde_json::json!({
                        "name": field.name,
                        "componentType": field.component_type,
                        "required": field.required,
                        "rules": field.rules.len(),
                        "linkage": field.linkage.is_some(),
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "fields": fields,
                "dependencyFields": schema.dependency_fields().len(),
            });
            println!("{}", serde_json::to_string_pretty(&doc).unwrap());
        }
        OutputFormat::Text => {
            println!(
                "{} static field(s), {} dependency field(s)",
                schema.fields().len(),
                schema.dependency_fields().len()
            );
            for field in schema.fields() {
                let mut notes = Vec::new();
                if field.required {
                    notes.push("required".to_string());
                }
                if !field.rules.is_empty() {
                    notes.push(format!("{} rule(s)", field.rules.len()));
                }
                if field.linkage.is_some() {
                    notes.push("linkage".to_string());
                }
                let suffix = if notes.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", notes.join(", "))
                };
                println!("  {}  <{}>{}", field.name, field.component_type, suffix);
            }
        }
    }
}

fn field_json(field: &RenderedField) -> serde_json::Value {
    serde_json::json!({
        "name": field.name,
        "componentType": field.component_type,
        "title": field.title,
        "required": field.required,
        "disabled": field.disabled,
        "value": field.value,
        "options": field.options,
    })
}

fn print_fields(fields: &[RenderedField], output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let doc: Vec<_> = fields.iter().map(field_json).collect();
            println!("{}", serde_json::to_string_pretty(&doc).unwrap());
        }
        OutputFormat::Text => {
            for field in fields {
                let value = field
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let mut flags = String::new();
                if field.required {
                    flags.push_str(" required");
                }
                if field.disabled {
                    flags.push_str(" disabled");
                }
                println!(
                    "  {}  <{}>  = {}{}",
                    field.name, field.component_type, value, flags
                );
            }
        }
    }
}

fn print_outcome(values: &ValueMap, fields: &[RenderedField], output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "values": values,
                "fields": fields.iter().map(field_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&doc).unwrap());
        }
        OutputFormat::Text => {
            println!("values:");
            for (name, value) in values {
                println!("  {} = {}", name, value);
            }
            println!("fields:");
            print_fields(fields, OutputFormat::Text);
        }
    }
}
