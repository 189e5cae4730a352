use anyhow::{Context, Result};
use clap::Parser;
use cloudlb::auth::EndpointTemplates;
use cloudlb::config::{self, AuthRegion};
use cloudlb::http::Method;
use cloudlb::path::{paginate, with_query};
use cloudlb::{Client, ClientConfig, LbError};
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// cloudlb - Cloud Load Balancers API client
///
/// Authenticates with the identity service and issues requests against the
/// regional load balancer management endpoint. Expired tokens are renewed
/// transparently.
///
/// Set LOADBALANCERS_VERBOSE to log every request and response.
///
/// Examples:
///   cloudlb --region dfw auth
///   cloudlb --region ord request GET /loadbalancers --limit 10
#[derive(Parser, Debug)]
#[command(author, version = cloudlb::VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account username (also via CLOUDLB_USERNAME)
    #[arg(long, env = "CLOUDLB_USERNAME", global = true)]
    username: Option<String>,

    /// Account API key (also via CLOUDLB_API_KEY)
    #[arg(long = "api-key", env = "CLOUDLB_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Management region: ord or dfw (also via CLOUDLB_REGION)
    #[arg(long, env = "CLOUDLB_REGION", global = true)]
    region: Option<String>,

    /// Identity service URL (defaults to the USA endpoint)
    #[arg(long = "auth-url", env = "CLOUDLB_AUTH_URL", value_name = "URL", global = true)]
    auth_url: Option<String>,

    /// Authenticate against the UK identity service
    #[arg(long, global = true, conflicts_with = "auth_url")]
    uk: bool,

    /// Management URL template with an {account} placeholder, for every region
    #[arg(long, env = "CLOUDLB_ENDPOINT", value_name = "TEMPLATE", global = true)]
    endpoint: Option<String>,

    /// Fail instead of re-authenticating when the token expires
    #[arg(long = "no-retry-auth", global = true)]
    no_retry_auth: bool,

    /// Give up on a request after this many seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u64>,

    /// Log every request and response
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Authenticate and show the management endpoint
    Auth,

    /// List load balancers on the account
    List {
        /// Include load balancers with status DELETED
        #[arg(long = "show-deleted")]
        show_deleted: bool,
    },

    /// List the protocols that can be balanced
    Protocols,

    /// List the supported balancing algorithms
    Algorithms,

    /// Send a request to the management API and print the response body
    Request(RequestArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// GET, POST, PUT or DELETE
    #[arg(value_name = "METHOD")]
    method: String,

    /// Path below the account prefix, e.g. /loadbalancers
    #[arg(value_name = "PATH")]
    path: String,

    /// Extra header as "Name: value" (repeatable)
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    headers: Vec<String>,

    /// Request body
    #[arg(long, short, value_name = "BODY")]
    data: Option<String>,

    /// Page size for list requests
    #[arg(long)]
    limit: Option<u32>,

    /// Page offset for list requests
    #[arg(long)]
    offset: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose || config::verbose_from_env();
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = build_config(&cli, verbose)?;
    let client = Client::connect(config)
        .await
        .context("Failed to connect to the load balancer API")?;

    match cli.command {
        Commands::Auth => {
            let session = client.session();
            println!("Account:  {}", session.account_id);
            println!("Endpoint: {}", session.endpoint.url(&session.endpoint.path_prefix));
        }
        Commands::List { show_deleted } => {
            let balancers = client
                .list_load_balancers(show_deleted)
                .await
                .context("Failed to list load balancers")?;
            for lb in &balancers {
                println!(
                    "{}\t{}\t{}",
                    lb.id,
                    lb.name,
                    lb.status.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Protocols => {
            let protocols = client
                .list_protocols()
                .await
                .context("Failed to list protocols")?;
            for protocol in &protocols {
                println!("{}\t{}", protocol.name, protocol.port);
            }
        }
        Commands::Algorithms => {
            let algorithms = client
                .list_algorithms()
                .await
                .context("Failed to list algorithms")?;
            for algorithm in &algorithms {
                println!("{}", algorithm.name);
            }
        }
        Commands::Request(args) => run_request(&client, args).await?,
    }
    Ok(())
}

fn build_config(cli: &Cli, verbose: bool) -> Result<ClientConfig, LbError> {
    let username = cli.username.clone().ok_or_else(|| {
        LbError::MissingArgument("Must supply a username (--username or CLOUDLB_USERNAME)".to_string())
    })?;
    let api_key = cli.api_key.clone().ok_or_else(|| {
        LbError::MissingArgument("Must supply an API key (--api-key or CLOUDLB_API_KEY)".to_string())
    })?;
    let region = cli.region.clone().ok_or_else(|| {
        LbError::MissingArgument("Must supply a region (--region or CLOUDLB_REGION)".to_string())
    })?;

    let mut config = ClientConfig::new(username, api_key, region)
        .retry_auth(!cli.no_retry_auth)
        .verbose(verbose);

    if cli.uk {
        config = config.auth_region(AuthRegion::Uk);
    }
    if let Some(url) = &cli.auth_url {
        config = config.auth_url(url.as_str());
    }
    if let Some(template) = &cli.endpoint {
        config = config.endpoints(EndpointTemplates::uniform(template.as_str()));
    }
    if let Some(seconds) = cli.timeout {
        config = config.timeout(Duration::from_secs(seconds));
    }
    Ok(config)
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), LbError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| LbError::Syntax(format!("Header must look like 'Name: value': {}", raw)))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| LbError::Syntax(format!("Invalid header name in: {}", raw)))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| LbError::Syntax(format!("Invalid header value in: {}", raw)))?;
    Ok((name, value))
}

async fn run_request(client: &Client, args: RequestArgs) -> Result<()> {
    let method: Method = args.method.parse()?;
    let path = with_query(&args.path, &paginate(args.limit, args.offset));

    let mut request = client.request(method, &path);
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(name, value);
    }
    if let Some(data) = args.data {
        request = request.body(data);
    }

    let response = client
        .execute(request)
        .await
        .with_context(|| format!("{} {} failed", method, path))?
        .error_for_fault()?;

    if method == Method::Delete && response.is_accepted() {
        eprintln!("Accepted");
    }

    match serde_json::from_slice::<serde_json::Value>(&response.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if response.body.is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}
