use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Method;
use url::form_urlencoded;

#[derive(Parser)]
#[command(name = "admin-cli")]
#[command(about = "Client for the proxy admin endpoint", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9901")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatsFormat {
    Text,
    Json,
    Prometheus,
}

#[derive(Subcommand)]
enum Commands {
    /// List admin commands
    Help,
    /// Dump stats
    Stats {
        #[arg(short, long, value_enum, default_value = "text")]
        format: StatsFormat,
    },
    /// Dump runtime values
    Runtime,
    /// Show logger levels, or change them
    Logging {
        /// Logger to change; every logger when omitted
        #[arg(short, long, requires = "level")]
        logger: Option<String>,
        /// New level
        level: Option<String>,
    },
    /// Show upstream clusters
    Clusters {
        #[arg(short, long)]
        cluster: Option<String>,
    },
    /// Show listener addresses
    Listeners,
    /// Show certificate details
    Certs,
    /// Show server state and uptime
    ServerInfo,
    /// Dump tracked configuration
    ConfigDump,
    /// Show the hot restart version
    HotRestartVersion,
    /// Force health checks to fail
    HealthcheckFail,
    /// Stop forcing health check failures
    HealthcheckOk,
    /// Reset every counter to zero
    ResetCounters,
    /// Enable or disable the CPU profiler
    Cpuprofiler {
        #[arg(action = clap::ArgAction::Set)]
        enable: bool,
    },
    /// Shut the server down
    Quit,
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Help => (Method::GET, "/help".to_string()),
            Commands::Stats { format } => {
                let path = match format {
                    StatsFormat::Text => "/stats",
                    StatsFormat::Json => "/stats?format=json",
                    StatsFormat::Prometheus => "/stats/prometheus",
                };
                (Method::GET, path.to_string())
            }
            Commands::Runtime => (Method::GET, "/runtime".to_string()),
            Commands::Logging { logger, level } => {
                let path = match (logger, level) {
                    (Some(logger), Some(level)) => with_query("/logging", logger, level),
                    (None, Some(level)) => with_query("/logging", "level", level),
                    _ => "/logging".to_string(),
                };
                (Method::POST, path)
            }
            Commands::Clusters { cluster } => match cluster {
                Some(name) => (Method::GET, with_query("/clusters", "cluster", name)),
                None => (Method::GET, "/clusters".to_string()),
            },
            Commands::Listeners => (Method::GET, "/listeners".to_string()),
            Commands::Certs => (Method::GET, "/certs".to_string()),
            Commands::ServerInfo => (Method::GET, "/server_info".to_string()),
            Commands::ConfigDump => (Method::GET, "/config_dump".to_string()),
            Commands::HotRestartVersion => (Method::GET, "/hot_restart_version".to_string()),
            Commands::HealthcheckFail => (Method::POST, "/healthcheck/fail".to_string()),
            Commands::HealthcheckOk => (Method::POST, "/healthcheck/ok".to_string()),
            Commands::ResetCounters => (Method::POST, "/reset_counters".to_string()),
            Commands::Cpuprofiler { enable } => {
                let flag = if *enable { "y" } else { "n" };
                (Method::POST, format!("/cpuprofiler?enable={}", flag))
            }
            Commands::Quit => (Method::POST, "/quitquitquit".to_string()),
        }
    }
}

fn with_query(path: &str, key: &str, value: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    format!("{}?{}", path, query)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: admin endpoint returned status {}", status);
        eprint!("{}", text);
        std::process::exit(1);
    }
    print!("{}", text);
    Ok(())
}
