use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod config;
mod filter;
mod html;
mod pages;
mod permissions;
mod schedule;
mod server;
mod session;
#[cfg(test)]
mod testing;
mod types;

use api::{ApiClient, ScheduleQuery};
use config::Config;
use server::AppState;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[derive(Parser, Debug)]
#[command(name = "appello")]
#[command(about = "Web frontend for school attendance and class schedules")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Base URL of the attendance backend (overrides APPELLO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value_t = DEFAULT_BIND)]
        bind: IpAddr,
    },

    /// Print a section's weekly schedule
    Schedule {
        /// Section id
        #[arg(long)]
        section: String,

        /// School year label, e.g. 2024-2025
        #[arg(long)]
        year: String,

        /// Quarter (First, Second, Third, Fourth)
        #[arg(long)]
        quarter: String,

        /// Backend access token
        #[arg(long, default_value = "")]
        token: String,
    },

    /// Check that the backend is reachable
    Check,
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("tower_http=warn".parse()?);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(url) = args.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }

    // Default to serve if no command specified
    let command = args.command.unwrap_or(Commands::Serve {
        port: DEFAULT_PORT,
        bind: DEFAULT_BIND,
    });

    match command {
        Commands::Serve { port, bind } => {
            let addr = SocketAddr::new(bind, port);
            server::serve(addr, Arc::new(AppState::new(config)?)).await?;
        }
        Commands::Schedule {
            section,
            year,
            quarter,
            token,
        } => {
            let api = ApiClient::new(&config.api_url, config.request_timeout)?;
            let query = ScheduleQuery {
                section_id: Some(&section),
                academic_year: Some(&year),
                quarter: Some(&quarter),
                ..Default::default()
            };
            let entries = api
                .with_token(&token)
                .schedules(&query)
                .await
                .context("Failed to fetch schedules")?;
            let week = schedule::group_by_weekday(entries);
            info!(count = week.len(), section = %section, "Found entries");
            for group in &week.days {
                for entry in &group.entries {
                    info!(
                        day = %group.day,
                        start = %schedule::format_time(&entry.start_time),
                        end = %schedule::format_time(&entry.end_time),
                        subject = entry.subject_name.as_deref().unwrap_or("-"),
                        teacher = entry.teacher_name.as_deref().unwrap_or("-"),
                        "Entry"
                    );
                }
            }
        }
        Commands::Check => {
            let api = ApiClient::new(&config.api_url, config.request_timeout)?;
            api.ping()
                .await
                .with_context(|| format!("Backend at {} is not reachable", api.base_url()))?;
            info!(backend = %api.base_url(), "Backend is reachable");
        }
    }

    Ok(())
}
