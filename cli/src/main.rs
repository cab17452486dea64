use clap::Parser;
use completeness::derive::{self, SpreadsheetColumns};
use completeness::pipeline::{
    self, Pipeline, PipelineConfig, DATA_CSV, DATA_PROP_CSV, REPORT_CSV,
};
use completeness::{
    build_shape, Backoff, EndpointClient, MinCountEngine, Prefixes, PropertyRef, RetryPolicy,
    ShapeDocument, ShapeTarget, WindowedFetcher,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct EndpointArgs {
    /// SPARQL endpoint URL
    #[arg(short, long, value_name = "URL")]
    endpoint: String,

    /// Seconds to wait between retry attempts
    #[arg(long, default_value_t = 2)]
    retry_interval_secs: u64,

    /// Wall-clock budget per query in seconds; retries are unbounded when omitted
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

impl EndpointArgs {
    fn client(&self) -> Result<EndpointClient, Box<dyn std::error::Error>> {
        let mut policy = RetryPolicy::default()
            .with_backoff(Backoff::Fixed(Duration::from_secs(self.retry_interval_secs)));
        if let Some(secs) = self.timeout_secs {
            policy = policy.with_deadline(Duration::from_secs(secs));
        }
        Ok(EndpointClient::with_policy(&self.endpoint, policy)?)
    }
}

#[derive(Parser, Debug)]
struct FetchTuningArgs {
    /// Entities per window query, at least 1
    #[arg(
        long,
        default_value_t = completeness::fetch::DEFAULT_WINDOW_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    window_size: usize,
}

#[derive(Parser)]
struct SpreadsheetArgs {
    /// Path to the input CSV
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Property URI every generated shape constrains
    #[arg(short, long, value_name = "URI")]
    property: String,

    /// Directory the shape files are written into
    #[arg(short, long, value_name = "DIR", default_value = "list_shapes")]
    output_dir: PathBuf,

    /// Zero-based column holding the shape name
    #[arg(long, default_value_t = 0)]
    name_column: usize,

    /// Zero-based column holding the target node URI
    #[arg(long, default_value_t = 1)]
    target_column: usize,

    /// Zero-based column holding the minimum cardinality
    #[arg(long, default_value_t = 2)]
    cardinality_column: usize,
}

#[derive(Parser)]
struct DeriveArgs {
    #[clap(flatten)]
    endpoint: EndpointArgs,

    /// Class URI whose properties are derived
    #[arg(short, long, value_name = "URI")]
    class: String,

    /// Name of the generated node shape
    #[arg(short, long, default_value = "SchemaShapes")]
    name: String,

    /// Path of the shapes file to write
    #[arg(short, long, value_name = "FILE", default_value = "shapes.ttl")]
    output: PathBuf,
}

#[derive(Parser)]
struct FetchArgs {
    #[clap(flatten)]
    endpoint: EndpointArgs,

    #[clap(flatten)]
    tuning: FetchTuningArgs,

    /// File holding the instance query (must project ?entity)
    #[arg(short, long, value_name = "FILE")]
    query: PathBuf,

    /// Shapes file listing the properties to fetch
    #[arg(short, long, value_name = "FILE")]
    shapes: PathBuf,

    /// Directory the data files are written into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Parser)]
struct ValidateArgs {
    /// Directory holding data.csv and data_prop.csv
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Shapes file to validate against
    #[arg(short, long, value_name = "FILE")]
    shapes: PathBuf,

    /// Path of the completeness report to write
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct RunArgs {
    #[clap(flatten)]
    endpoint: EndpointArgs,

    #[clap(flatten)]
    tuning: FetchTuningArgs,

    /// File holding the instance query (must project ?entity)
    #[arg(short, long, value_name = "FILE")]
    query: PathBuf,

    /// Shapes file to validate against
    #[arg(short, long, value_name = "FILE")]
    shapes: PathBuf,

    /// Directory all artifacts are written into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate per-entity node shapes from a spreadsheet
    Spreadsheet(SpreadsheetArgs),
    /// Derive a class shape from the ontology's rdfs:domain declarations
    Ontology(DeriveArgs),
    /// Derive a class shape from property usage statistics
    Statistics(DeriveArgs),
    /// Fetch the entity list and property values into CSV checkpoints
    Fetch(FetchArgs),
    /// Validate previously fetched data against a shapes file, offline
    Validate(ValidateArgs),
    /// Run the full pipeline against an endpoint
    Run(RunArgs),
}

fn load_shapes(path: &PathBuf) -> Result<ShapeDocument, Box<dyn std::error::Error>> {
    let turtle = fs::read_to_string(path)?;
    Ok(ShapeDocument::from_turtle(&turtle, &Prefixes::default())?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Spreadsheet(args) => {
            let csv = fs::read_to_string(&args.input)?;
            let columns = SpreadsheetColumns {
                name: args.name_column,
                target: args.target_column,
                min_count: args.cardinality_column,
            };
            let property = PropertyRef::new(args.property);
            let shapes =
                derive::shapes_from_spreadsheet(&csv, &columns, &property, &Prefixes::default())?;
            fs::create_dir_all(&args.output_dir)?;
            for shape in &shapes {
                let path = args.output_dir.join(format!("{}.ttl", shape.name));
                fs::write(&path, shape.to_turtle())?;
            }
            println!("wrote {} shapes to {}", shapes.len(), args.output_dir.display());
        }
        Commands::Ontology(args) => {
            let client = args.endpoint.client()?;
            let constraints = derive::properties_by_ontology(&client, &args.class)?;
            write_class_shape(&args, &constraints)?;
        }
        Commands::Statistics(args) => {
            let client = args.endpoint.client()?;
            let constraints = derive::properties_by_statistics(&client, &args.class)?;
            write_class_shape(&args, &constraints)?;
        }
        Commands::Fetch(args) => {
            let shape = load_shapes(&args.shapes)?;
            let instance_query = fs::read_to_string(&args.query)?;
            let client = args.endpoint.client()?;
            let fetcher = WindowedFetcher::new(&client).with_window_size(args.tuning.window_size);

            println!("retrieving entity list");
            let (entities, _) = fetcher.fetch_entities(&instance_query)?;
            fs::create_dir_all(&args.output_dir)?;
            pipeline::write_entities_csv(&args.output_dir.join(DATA_CSV), &entities)?;

            println!("retrieving property values for {} entities", entities.len());
            let rows = fetcher.fetch_property_values(&entities, &shape.property_list())?;
            pipeline::write_property_rows_csv(&args.output_dir.join(DATA_PROP_CSV), &rows)?;
            println!("wrote {} rows to {}", rows.len(), args.output_dir.display());
        }
        Commands::Validate(args) => {
            let shape = load_shapes(&args.shapes)?;
            let entities = pipeline::read_entities_csv(&args.data_dir.join(DATA_CSV))?;
            let rows = pipeline::read_property_rows_csv(&args.data_dir.join(DATA_PROP_CSV))?;

            let matrix =
                pipeline::validate_offline(&MinCountEngine::new(), &shape, &entities, &rows)?;
            let output = args
                .output
                .unwrap_or_else(|| args.data_dir.join(REPORT_CSV));
            fs::write(&output, matrix.to_csv())?;
            println!(
                "validated {} entities, overall completeness {:.3}, report at {}",
                matrix.rows.len(),
                matrix.overall(),
                output.display()
            );
        }
        Commands::Run(args) => {
            let shape = load_shapes(&args.shapes)?;
            let instance_query = fs::read_to_string(&args.query)?;
            let client = args.endpoint.client()?;
            let config = PipelineConfig {
                output_dir: args.output_dir.clone(),
                window_size: args.tuning.window_size,
            };
            let matrix = Pipeline::new(&client, config).run(&shape, &instance_query)?;
            println!(
                "validated {} entities, overall completeness {:.3}",
                matrix.rows.len(),
                matrix.overall()
            );
        }
    }
    Ok(())
}

fn write_class_shape(
    args: &DeriveArgs,
    constraints: &[completeness::PropertyConstraint],
) -> Result<(), Box<dyn std::error::Error>> {
    let shape = build_shape(
        &args.name,
        ShapeTarget::Class(args.class.clone()),
        constraints,
        &Prefixes::default(),
    );
    fs::write(&args.output, shape.to_turtle())?;
    println!(
        "wrote shape with {} properties to {}",
        constraints.len(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_args(window_size: &str) -> Vec<&str> {
        vec![
            "completeness",
            "fetch",
            "--endpoint",
            "http://localhost/sparql",
            "--query",
            "instances.rq",
            "--shapes",
            "shapes.ttl",
            "--window-size",
            window_size,
        ]
    }

    #[test]
    fn zero_window_size_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(fetch_args("0")).is_err());
    }

    #[test]
    fn positive_window_size_parses() {
        assert!(Cli::try_parse_from(fetch_args("50")).is_ok());
        assert!(Cli::try_parse_from(fetch_args("1")).is_ok());
    }

    #[test]
    fn run_rejects_zero_window_size_too() {
        let args = vec![
            "completeness",
            "run",
            "--endpoint",
            "http://localhost/sparql",
            "--query",
            "instances.rq",
            "--shapes",
            "shapes.ttl",
            "--window-size",
            "0",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
