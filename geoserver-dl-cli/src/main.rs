use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use geoserver_dl::config::{DEFAULT_HOST, DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT};
use geoserver_dl::{
    reproject, ClientConfig, DecodedResult, Geocoder, Point, QueryParams, VectorWriter,
    WfsClient,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Geoserver base URL
    #[arg(long, global = true, env = "GEOSERVER_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    /// User-Agent sent with every request
    #[arg(long, global = true, env = "GEOSERVER_DL_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Nominatim base URL
    #[arg(long, global = true, env = "NOMINATIM_URL", default_value = DEFAULT_NOMINATIM_URL)]
    nominatim_url: String,
}

impl ClientArgs {
    fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_host(self.host.as_str())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_user_agent(self.user_agent.as_str())
            .with_nominatim_url(self.nominatim_url.as_str())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a WFS dataset (GetFeature)
    Fetch {
        /// Geoserver workspace, e.g. census2011
        workspace: String,

        /// Dataset (feature type) name, e.g. counties
        dataset: String,

        /// Output format requested from the server
        #[arg(short, long, default_value = "application/json")]
        format: String,

        /// Target EPSG code
        #[arg(long)]
        srs: Option<u32>,

        /// (E)CQL filter expression
        #[arg(long)]
        filter: Option<String>,

        /// Comma-separated property names to keep (geometry is always kept)
        #[arg(short, long, value_delimiter = ',')]
        properties: Vec<String>,

        /// Directory for extracted zip members or the written spatial file
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Write the JSON result with this OGR driver (e.g. "ESRI Shapefile", GPKG)
        #[arg(long, value_name = "DRIVER", requires_all = ["output", "srs"])]
        write: Option<String>,

        /// File name (without extension) for --write; defaults to the dataset name
        #[arg(long, requires = "write")]
        name: Option<String>,
    },

    /// Show the feature-type schema of a dataset
    Schema { workspace: String, dataset: String },

    /// Geocode an address
    Geocode { address: String },

    /// Reverse geocode an "x, y" location
    Reverse {
        #[arg(allow_hyphen_values = true)]
        location: String,

        /// EPSG code of the location
        #[arg(long, default_value_t = 4326)]
        epsg: u32,
    },

    /// Reproject an "x, y" point between EPSG codes
    Reproject {
        #[arg(allow_hyphen_values = true)]
        point: String,

        #[arg(long)]
        from: u32,

        #[arg(long)]
        to: u32,
    },
}

fn main() -> ExitCode {
    // log init; stdout carries the data, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // parse CLI args
    let cli = Cli::parse();

    // time the whole run
    let start_time = std::time::Instant::now();
    match run(cli) {
        Ok(()) => {
            info!("Finished in {:?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.client.config();

    match cli.command {
        Command::Fetch {
            workspace,
            dataset,
            format,
            srs,
            filter,
            properties,
            output,
            write,
            name,
        } => {
            // check the driver before any download
            let writer = write
                .as_deref()
                .zip(srs)
                .map(|(driver, epsg)| VectorWriter::new(driver, epsg))
                .transpose()?;

            let client = WfsClient::new(config)?;
            let dataset = client.dataset(&workspace, &dataset);

            // build the query
            let mut query = QueryParams::new().output_format(format).properties(properties);
            query.srs = srs;
            query.filter = filter;

            let result = client
                .fetch(&dataset, &query, output.as_deref())
                .with_context(|| format!("Failed to fetch {}", dataset))?;

            // write a spatial file, or print the decoded result
            match (writer, &result, output.as_deref()) {
                (Some(writer), DecodedResult::Json { schema, geojson }, Some(directory)) => {
                    let name = name.unwrap_or_else(|| dataset.dataset.clone());
                    let path = writer
                        .write(geojson, schema, directory, &name)
                        .with_context(|| format!("Failed to write {}", dataset))?;
                    println!("{}", path.display());
                }
                (Some(_), _, _) => {
                    anyhow::bail!("--write needs a JSON response; request --format application/json")
                }
                (None, _, _) => print_result(&result)?,
            }
        }
        Command::Schema { workspace, dataset } => {
            // raw schema, as the service reports it
            let client = WfsClient::new(config)?;
            let dataset = client.dataset(&workspace, &dataset);
            let schema = client.describe_feature_type(&dataset)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Geocode { address } => {
            let geocoder = Geocoder::new(&config)?;
            let place = geocoder.geocode_address(&address)?;
            println!("{}", serde_json::to_string_pretty(&place)?);
        }
        Command::Reverse { location, epsg } => {
            // reprojected to WGS84 inside the geocoder
            let location: Point = location.parse()?;
            let geocoder = Geocoder::new(&config)?;
            let place = geocoder.geocode_location(location, epsg)?;
            println!("{}", serde_json::to_string_pretty(&place)?);
        }
        Command::Reproject { point, from, to } => {
            let point: Point = point.parse()?;
            let projected = reproject(point, from, to)?;
            println!("{}", projected);
        }
    }

    Ok(())
}

fn print_result(result: &DecodedResult) -> Result<()> {
    match result {
        DecodedResult::Json { .. } => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        DecodedResult::Csv { text } => {
            print!("{}", text);
        }
        DecodedResult::Zip { directory, files } => {
            info!("Wrote {} files to {:?}", files.len(), directory);
            for file in files {
                println!("{}", directory.join(file).display());
            }
        }
    }
    Ok(())
}
