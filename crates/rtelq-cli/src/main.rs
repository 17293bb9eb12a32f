use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use rtelq_eval::{cross_reference, run_search, CorrelationOptions, SearchOptions};
use rtelq_parser::{parse_query, validate_progressive, validate_query, EntityType};

#[derive(Parser)]
#[command(name = "rtelq")]
#[command(about = "Parse, validate, and evaluate security telemetry queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query and print the AST as JSON
    Parse {
        /// The query expression to parse
        query: String,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },

    /// Validate a query against an entity type's field schema
    ///
    /// Prints a validation report as JSON. The report includes structured
    /// errors, suggestions, per-field issues, and an automatically corrected
    /// query when one differs from the input. Exits non-zero when the query
    /// is invalid.
    Validate {
        /// The query expression to validate
        query: String,

        /// Entity type to validate against (flows, alarms, rules, devices, target_lists)
        #[arg(short, long)]
        entity: String,

        /// Run the staged validator and report per-stage scores
        #[arg(long)]
        progressive: bool,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },

    /// Filter, sort, and page records from a JSON file with a query
    ///
    /// Records are read as a JSON array, or as NDJSON (newline-delimited
    /// JSON) from stdin when no file is given.
    Search {
        /// The query expression
        query: String,

        /// Entity type of the records
        #[arg(short, long)]
        entity: String,

        /// Path to a JSON array of records (if omitted, reads NDJSON from stdin)
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// Sort matches by this field
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort in descending order
        #[arg(long)]
        descending: bool,

        /// Skip this many matches
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Return at most this many matches
        #[arg(short, long)]
        limit: Option<usize>,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },

    /// Cross-reference two record sets on shared fields
    ///
    /// Both sides are JSON arrays. The exact path prints the matching
    /// secondary records; with --scored, each retained record carries a
    /// weighted correlation score, per-field breakdown, and aggregate
    /// statistics.
    Correlate {
        /// Path to the primary record set (a JSON array)
        #[arg(long)]
        primary: PathBuf,

        /// Path to the secondary record set (a JSON array)
        #[arg(long)]
        secondary: PathBuf,

        /// Entity type of the primary records
        #[arg(long)]
        primary_entity: String,

        /// Entity type of the secondary records
        #[arg(long)]
        secondary_entity: String,

        /// Correlation fields, comma separated (e.g. source_ip,protocol)
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Use weighted fuzzy scoring instead of exact matching
        #[arg(long)]
        scored: bool,

        /// Path to a correlation options JSON file
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { query, pretty } => cmd_parse(&query, pretty),
        Commands::Validate {
            query,
            entity,
            progressive,
            pretty,
        } => cmd_validate(&query, &entity, progressive, pretty),
        Commands::Search {
            query,
            entity,
            records,
            sort_by,
            descending,
            offset,
            limit,
            pretty,
        } => {
            let options = SearchOptions {
                sort_by,
                descending,
                offset,
                limit,
            };
            cmd_search(&query, &entity, records, &options, pretty)
        }
        Commands::Correlate {
            primary,
            secondary,
            primary_entity,
            secondary_entity,
            fields,
            scored,
            options,
            pretty,
        } => cmd_correlate(
            primary,
            secondary,
            &primary_entity,
            &secondary_entity,
            fields,
            scored,
            options,
            pretty,
        ),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_parse(query: &str, pretty: bool) {
    match parse_query(query) {
        Ok(ast) => print_json(&ast, pretty),
        Err(e) => {
            for err in &e.errors {
                eprintln!("Parse error at position {}: {}", err.position, err.message);
                eprintln!("  suggestion: {}", err.suggestion);
            }
            process::exit(1);
        }
    }
}

fn cmd_validate(query: &str, entity: &str, progressive: bool, pretty: bool) {
    let entity = entity_arg(entity);

    if progressive {
        let report = validate_progressive(query, entity);
        let valid = report.is_valid;
        print_json(&report, pretty);
        if !valid {
            process::exit(1);
        }
    } else {
        let report = validate_query(query, entity);
        let valid = report.is_valid;
        print_json(&report, pretty);
        if !valid {
            process::exit(1);
        }
    }
}

fn cmd_search(
    query: &str,
    entity: &str,
    records_path: Option<PathBuf>,
    options: &SearchOptions,
    pretty: bool,
) {
    let entity = entity_arg(entity);
    let records = match records_path {
        Some(path) => load_records(&path),
        None => load_ndjson_stdin(),
    };

    match run_search(&records, entity, query, options) {
        Ok(hits) => {
            eprintln!("{} of {} records matched", hits.len(), records.len());
            print_json(&hits, pretty);
        }
        Err(e) => {
            eprintln!("Search error: {e}");
            process::exit(1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_correlate(
    primary_path: PathBuf,
    secondary_path: PathBuf,
    primary_entity: &str,
    secondary_entity: &str,
    fields: Vec<String>,
    scored: bool,
    options_path: Option<PathBuf>,
    pretty: bool,
) {
    let primary_entity = entity_arg(primary_entity);
    let secondary_entity = entity_arg(secondary_entity);
    let primary = load_records(&primary_path);
    let secondary = load_records(&secondary_path);
    let options = match options_path {
        Some(path) => load_options(&path),
        None => CorrelationOptions::default(),
    };

    match cross_reference(
        &primary,
        primary_entity,
        &secondary,
        secondary_entity,
        &fields,
        &options,
        scored,
    ) {
        Ok(result) => print_json(&result, pretty),
        Err(e) => {
            eprintln!("Correlation error: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn entity_arg(s: &str) -> EntityType {
    match EntityType::from_str(s) {
        Some(entity) => entity,
        None => {
            let valid: Vec<&str> = EntityType::ALL.iter().map(|e| e.as_str()).collect();
            eprintln!("Unknown entity type '{s}'; expected one of: {}", valid.join(", "));
            process::exit(1);
        }
    }
}

/// Load a JSON array of records from a file.
fn load_records(path: &std::path::Path) -> Vec<serde_json::Value> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            process::exit(1);
        }
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(&contents) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Invalid JSON array in {}: {e}", path.display());
            process::exit(1);
        }
    }
}

/// Read NDJSON records from stdin, skipping blank lines.
fn load_ndjson_stdin() -> Vec<serde_json::Value> {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Error reading stdin: {e}");
        process::exit(1);
    }

    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(v) => records.push(v),
            Err(e) => {
                eprintln!("Invalid JSON on line {}: {e}", idx + 1);
                process::exit(1);
            }
        }
    }
    records
}

fn load_options(path: &std::path::Path) -> CorrelationOptions {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            process::exit(1);
        }
    };
    match serde_json::from_str(&contents) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Invalid correlation options in {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
