//! condlab CLI: inspect the condition dictionary and assemble conditions.
//!
//! Commands:
//! - `dictionary`: summarize (or dump) the loaded dictionary
//! - `validate-dictionary`: check the dictionary's referential integrity
//! - `constraints`: right-hand types and indicator dimensions for a left operand
//! - `operators`: operators legal between two operands
//! - `check`: reconcile one condition and print its payload
//! - `assemble`: turn a TOML/JSON rule file into server payloads

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use condlab_core::compat::{resolve_operators, resolve_right_constraints};
use condlab_core::condition::ConditionBuilder;
use condlab_core::config::{CondlabConfig, DictionarySource, LOG_ENV};
use condlab_core::dictionary::{Dictionary, DictionaryCache};
use condlab_core::domain::OperatorCode;
use condlab_core::editor::{selectable_indicators, IndicatorFilter};
use condlab_core::OperandType;
use condlab_core::normalize::normalize_side;
use condlab_core::rules::{RuleList, RuleSetDoc};
use condlab_core::shorthand::parse_operand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "condlab",
    about = "condlab CLI: backtest condition dictionary and rule assembly"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Load the dictionary from this JSON file instead of the configured source.
    #[arg(long, global = true, conflicts_with = "url")]
    dictionary: Option<PathBuf>,

    /// Load the dictionary from this URL instead of the configured source.
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the loaded dictionary.
    Dictionary {
        /// Print the full JSON document instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check the dictionary for dangling references and bad parameter bounds.
    ValidateDictionary,
    /// Show what may appear on the right of a left operand.
    Constraints {
        /// Left operand, e.g. `indicator:RSI` or `price:Close`.
        #[arg(long)]
        left: String,
    },
    /// Show the operators legal between two operands.
    Operators {
        #[arg(long)]
        left: String,
        #[arg(long)]
        right: String,
    },
    /// Reconcile one condition and print its payload.
    Check {
        #[arg(long)]
        left: String,
        /// Operator code (GT, CROSSES_ABOVE, ...). Defaults to GT.
        #[arg(long)]
        op: Option<String>,
        #[arg(long)]
        right: String,
    },
    /// Assemble a rule file (.toml or .json) into server payloads.
    Assemble {
        /// Rule file path.
        file: PathBuf,

        /// Write the payload here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config);

    let source = match (&cli.dictionary, &cli.url) {
        (Some(path), _) => DictionarySource::File { path: path.clone() },
        (None, Some(url)) => DictionarySource::Http {
            url: url.clone(),
            timeout_secs: match &config.dictionary {
                DictionarySource::Http { timeout_secs, .. } => *timeout_secs,
                _ => 10,
            },
        },
        (None, None) => config.dictionary.clone(),
    };

    match cli.command {
        Commands::ValidateDictionary => run_validate(&source),
        Commands::Dictionary { json } => run_dictionary(&*load_dictionary(&source)?, json),
        Commands::Constraints { left } => run_constraints(&*load_dictionary(&source)?, &left),
        Commands::Operators { left, right } => {
            run_operators(&*load_dictionary(&source)?, &left, &right)
        }
        Commands::Check { left, op, right } => {
            run_check(&*load_dictionary(&source)?, &left, op.as_deref(), &right)
        }
        Commands::Assemble { file, output } => {
            run_assemble(&*load_dictionary(&source)?, &file, output.as_deref())
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("condlab").join("config.toml"))
}

fn load_config(explicit: Option<&Path>) -> Result<CondlabConfig> {
    if let Some(path) = explicit {
        return CondlabConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => CondlabConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display())),
        _ => Ok(CondlabConfig::default()),
    }
}

fn init_logging(config: &CondlabConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dictionary(source: &DictionarySource) -> Result<Arc<Dictionary>> {
    let provider = source.build_provider()?;
    let cache = DictionaryCache::new(provider);
    debug!(provider = cache.provider_name(), "loading dictionary");
    Ok(cache.get()?)
}

fn run_validate(source: &DictionarySource) -> Result<()> {
    let provider = source.build_provider()?;
    let dict = provider.fetch()?;
    let validation = dict.validate();
    if validation.is_valid {
        println!(
            "Dictionary {} ({}) is valid: {} dimensions, {} indicators, {} price fields",
            dict.version,
            provider.name(),
            dict.dimensions.len(),
            dict.indicators.len(),
            dict.price_fields.len()
        );
        return Ok(());
    }
    for err in &validation.errors {
        eprintln!("  - {err}");
    }
    bail!("dictionary has {} problem(s)", validation.errors.len());
}

fn run_dictionary(dict: &Dictionary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(dict)?);
        return Ok(());
    }

    println!("Dictionary version {}", dict.version);
    println!();
    println!("Dimensions:");
    for d in &dict.dimensions {
        let range = d
            .range
            .map(|[lo, hi]| format!(" [{lo}, {hi}]"))
            .unwrap_or_default();
        println!("  {:<14} {}{}", d.id, d.name, range);
    }
    println!();
    println!("Price fields:");
    for p in &dict.price_fields {
        println!("  {:<14} {}", p.code, p.dimension);
    }
    println!();
    println!("Indicators:");
    for ind in &dict.indicators {
        let params: Vec<String> = ind
            .params
            .iter()
            .map(|p| format!("{}={} [{}..{}]", p.name, p.default, p.min, p.max))
            .collect();
        let outputs: Vec<&str> = ind.outputs.iter().map(|o| o.name.as_str()).collect();
        println!(
            "  {:<14} {:<12} params: {}  outputs: {}",
            ind.code,
            ind.dimension,
            params.join(", "),
            outputs.join("|")
        );
        for t in &ind.transforms {
            let target = t.affects_dimension.as_deref().unwrap_or("-");
            println!("  {:<14} transform {} -> {}", "", t.code, target);
        }
    }
    println!();
    println!("Compatibility:");
    for rule in &dict.dimension_compatibility {
        let types: Vec<&str> = rule.allow_right_types.iter().map(|t| t.as_str()).collect();
        println!(
            "  {:<14} right types: {}  indicator dims: {}",
            rule.left_dimension,
            types.join(","),
            rule.allow_indicator_dimensions.join(",")
        );
    }
    println!();
    println!("Allowed operators:");
    for rule in &dict.dimension_allowed_operators {
        let ops: Vec<&str> = rule.operators.iter().map(|o| o.as_str()).collect();
        println!("  {:<14} {}", rule.dimension, ops.join(" "));
    }
    Ok(())
}

fn run_constraints(dict: &Dictionary, left: &str) -> Result<()> {
    let left = parse_operand(dict, left)?;
    let side = normalize_side(dict, &left);
    let constraints = resolve_right_constraints(dict, &side.dimension);
    let filter = IndicatorFilter::from_constraints(&constraints);
    let selectable: Vec<&str> = if constraints.allows_type(OperandType::Indicator) {
        selectable_indicators(dict, filter.as_ref())
            .iter()
            .map(|d| d.code.as_str())
            .collect()
    } else {
        Vec::new()
    };

    let out = serde_json::json!({
        "left": left.to_string(),
        "leftDimension": side.dimension.as_str(),
        "constraints": constraints,
        "selectableIndicators": selectable,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_operators(dict: &Dictionary, left: &str, right: &str) -> Result<()> {
    let left = normalize_side(dict, &parse_operand(dict, left)?);
    let right = normalize_side(dict, &parse_operand(dict, right)?);
    let ops = resolve_operators(dict, &left, &right);
    for op in ops {
        let label = dict.operator(op).map(|o| o.name.as_str()).unwrap_or("");
        println!("{:<14} {}", op.as_str(), label);
    }
    Ok(())
}

fn run_check(dict: &Dictionary, left: &str, op: Option<&str>, right: &str) -> Result<()> {
    let left = parse_operand(dict, left)?;
    let right = parse_operand(dict, right)?;
    let operator = match op {
        Some(code) => code.parse::<OperatorCode>()?,
        None => OperatorCode::Gt,
    };

    let builder = ConditionBuilder::with_operands(dict, left, operator, right);
    for correction in builder.corrections() {
        warn!(%correction, "condition corrected");
    }
    let condition = builder.condition()?;
    println!("{}", serde_json::to_string_pretty(&condition)?);
    eprintln!("fingerprint: {}", condition.fingerprint().short());
    Ok(())
}

fn run_assemble(dict: &Dictionary, file: &Path, output: Option<&Path>) -> Result<()> {
    let doc = RuleSetDoc::load(file)?;
    let list = RuleList::from_doc(dict, &doc)?;

    for (id, correction) in list.corrections() {
        warn!(%id, %correction, "condition corrected");
    }
    for (first, dup) in list.duplicates() {
        warn!(%first, duplicate = %dup, "duplicate condition");
    }

    let payload = list.payload()?;
    let json = serde_json::to_string_pretty(&payload)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Wrote {} condition(s) to {}",
                payload.conditions.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
