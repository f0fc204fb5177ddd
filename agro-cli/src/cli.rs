use std::{net::SocketAddr, path::PathBuf};

use agro_core::{
    AnalysisError, AnalysisMode, AnalysisRequest, AnalysisResponse, AnalysisService, ChatMessage,
    ClimateParameter, Config, LocationDescriptor, LocationSearch, ParameterTable, WeatherHistory,
    WeatherSummary,
    aggregate::summarize_parameters,
    provider::{HistoryRequest, NominatimSearch, PowerClient},
    server,
};
use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Text, validator::Validation};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "agro", version, about = "Crop recommendations for any point on the map")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the model gateway credential and server defaults.
    Configure,

    /// Run the HTTP analysis endpoint.
    Serve {
        /// Listen address, e.g. "0.0.0.0:8787". Overrides the config file.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Look up places by name.
    Search {
        query: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Print a crop analysis for a location.
    Analyze {
        #[command(flatten)]
        target: Target,

        /// Ask for a short bullet-point summary instead of the full report.
        #[arg(long)]
        summarize: bool,

        /// Days of weather history to summarize.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Ask follow-up questions about a location.
    Chat {
        #[command(flatten)]
        target: Target,

        /// File holding an earlier analysis to discuss.
        #[arg(long)]
        context_file: Option<PathBuf>,

        #[arg(long)]
        days: Option<u32>,
    },
}

/// Where to analyze: a place name, or explicit coordinates.
#[derive(Debug, Args)]
pub struct Target {
    /// Place to geocode, e.g. "Nairobi, Kenya".
    #[arg(long, conflicts_with_all = ["lat", "lon"], required_unless_present = "lat")]
    place: Option<String>,

    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Display name used together with --lat/--lon.
    #[arg(long)]
    name: Option<String>,
}

impl Target {
    async fn resolve(self, search: &dyn LocationSearch) -> anyhow::Result<LocationDescriptor> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            let mut location = LocationDescriptor::new(lat, lon);
            location.name = self.name;
            return Ok(location);
        }

        let place = self.place.ok_or_else(|| anyhow!("Pass either --place or --lat/--lon."))?;
        let hit = search
            .search(&place, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No location found for '{place}'. Try a different search term."))?;

        Ok(hit.into())
    }
}

impl Cli {
    pub fn default_log_level(&self) -> &'static str {
        match self.command {
            Command::Serve { .. } => "info",
            _ => "warn",
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(Config::load()?),
            Command::Serve { bind } => serve(Config::load_with_env()?, bind).await,
            Command::Search { query, limit } => search(&query, limit).await,
            Command::Analyze { target, summarize, days } => {
                let config = Config::load_with_env()?;
                let mode = if summarize { AnalysisMode::Summarize } else { AnalysisMode::Full };
                analyze(&config, target, mode, days).await
            }
            Command::Chat { target, context_file, days } => {
                chat(&Config::load_with_env()?, target, context_file, days).await
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Password::new("Hugging Face access token (empty keeps the current one):")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;

    let model = Text::new("Model id:").with_default(&config.gateway.model).prompt()?;

    let bind = Text::new("Server bind address:")
        .with_default(&config.server.bind)
        .with_validator(|s: &str| {
            Ok(match s.parse::<SocketAddr>() {
                Ok(_) => Validation::Valid,
                Err(_) => Validation::Invalid("Expected host:port, e.g. 127.0.0.1:8787".into()),
            })
        })
        .prompt()?;

    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }
    config.gateway.model = model;
    config.server.bind = bind;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    if !config.is_gateway_configured() {
        println!("Note: no access token set yet; analyses will fail until one is configured.");
    }

    Ok(())
}

async fn serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let service = AnalysisService::from_config(&config.gateway);
    let router = server::router(service, &config.server.path);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    server::serve(listener, router).await
}

async fn search(query: &str, limit: usize) -> anyhow::Result<()> {
    let hits = NominatimSearch::new()?.search(query, limit).await?;

    if hits.is_empty() {
        println!("No results. Try a different search term.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{:>2}. {}", i + 1, hit.display_name);
        println!(
            "    Lat: {:.4}, Lon: {:.4}{}",
            hit.lat,
            hit.lon,
            hit.kind.as_deref().map(|k| format!(" ({k})")).unwrap_or_default()
        );
    }

    Ok(())
}

async fn analyze(
    config: &Config,
    target: Target,
    mode: AnalysisMode,
    days: Option<u32>,
) -> anyhow::Result<()> {
    let location = target.resolve(&NominatimSearch::new()?).await?;
    let weather = load_weather(&location, days.unwrap_or(config.weather.history_days)).await;

    let service = AnalysisService::from_config(&config.gateway);
    let response = service
        .run(AnalysisRequest::new(location, weather, mode))
        .await
        .map_err(explain)?;

    print_response(&response);
    Ok(())
}

async fn chat(
    config: &Config,
    target: Target,
    context_file: Option<PathBuf>,
    days: Option<u32>,
) -> anyhow::Result<()> {
    let context = context_file
        .map(|path| {
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read context file: {}", path.display()))
        })
        .transpose()?;

    let location = target.resolve(&NominatimSearch::new()?).await?;
    let weather = load_weather(&location, days.unwrap_or(config.weather.history_days)).await;
    let service = AnalysisService::from_config(&config.gateway);

    println!(
        "Chatting about {} ({}). Empty line or 'exit' to quit.",
        location.name.as_deref().unwrap_or("Unknown"),
        location.coordinates()
    );

    let mut messages: Vec<ChatMessage> = Vec::new();

    loop {
        let question = match Text::new("You:").prompt() {
            Ok(q) => q,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        let question = question.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        messages.push(ChatMessage::user(question));
        let request =
            AnalysisRequest::chat(location.clone(), weather.clone(), context.clone(), messages.clone());

        match service.run(request).await {
            Ok(response) => {
                println!("\n{}\n", response.analysis);
                messages.push(ChatMessage::assistant(response.analysis));
            }
            Err(err) => {
                // Keep the conversation as it was so the question can be asked again.
                messages.pop();
                eprintln!("{:#}", explain(err));
            }
        }
    }

    Ok(())
}

/// Fetch and summarize recent weather. Failures are reported and the analysis
/// proceeds without weather data.
async fn load_weather(location: &LocationDescriptor, days: u32) -> Option<WeatherSummary> {
    let today = chrono::Utc::now().date_naive();
    let request = HistoryRequest::recent(location.lat, location.lon, today, days);

    let client = match PowerClient::new() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Warning: weather history unavailable: {err:#}");
            return None;
        }
    };

    match client.daily(&request).await {
        Ok(table) if !table.is_empty() => {
            print_weather(&request, &table);
            Some(summarize_parameters(&table))
        }
        Ok(_) => {
            eprintln!("Warning: no weather history returned for this location.");
            None
        }
        Err(err) => {
            eprintln!("Warning: weather history unavailable: {err:#}");
            None
        }
    }
}

fn print_weather(request: &HistoryRequest, table: &ParameterTable) {
    println!("Weather {} .. {}", request.start, request.end);

    for parameter in ClimateParameter::all() {
        let stats = parameter.stats(table);
        let (Some(avg), Some(min), Some(max)) = (stats.avg, stats.min, stats.max) else {
            continue;
        };
        let unit = parameter.unit();
        println!(
            "  {:<24} avg {avg:>8.2} {unit:<9} min {min:>8.2}  max {max:>8.2}",
            parameter.label()
        );
    }
    println!();
}

fn print_response(response: &AnalysisResponse) {
    println!(
        "{} ({})",
        response.location.name.as_deref().unwrap_or("Unknown location"),
        response.location.coordinates
    );
    println!("Generated at {}\n", response.timestamp);
    println!("{}", response.analysis);
}

fn explain(err: AnalysisError) -> anyhow::Error {
    match err {
        AnalysisError::GatewayConfig(reason) => anyhow!(
            "Model gateway is not configured: {reason}.\n\
             Hint: run `agro configure` or set HUGGING_FACE_ACCESS_TOKEN."
        ),
        other => {
            let envelope = other.envelope();
            match envelope.details {
                Some(details) => anyhow!("{}: {}", envelope.error, details),
                None => anyhow!("{}", envelope.error),
            }
        }
    }
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
    fn analyze_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["agro", "analyze", "--lat", "40.7", "--lon", "-74.0", "--summarize"])
            .expect("should parse");

        match cli.command {
            Command::Analyze { target, summarize, .. } => {
                assert_eq!(target.lat, Some(40.7));
                assert_eq!(target.lon, Some(-74.0));
                assert!(summarize);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn place_and_coordinates_conflict() {
        let res = Cli::try_parse_from(["agro", "analyze", "--place", "Lima", "--lat", "1", "--lon", "2"]);
        assert!(res.is_err());
    }

    #[test]
    fn analyze_requires_a_target() {
        assert!(Cli::try_parse_from(["agro", "analyze"]).is_err());
    }

    #[test]
    fn serve_logs_more_than_one_shot_commands() {
        let serve = Cli::try_parse_from(["agro", "serve"]).unwrap();
        let search = Cli::try_parse_from(["agro", "search", "Lima"]).unwrap();
        assert_eq!(serve.default_log_level(), "info");
        assert_eq!(search.default_log_level(), "warn");
    }

    #[test]
    fn configuration_errors_carry_a_hint() {
        let err = explain(AnalysisError::GatewayConfig("no API key".into()));
        assert!(err.to_string().contains("agro configure"));

        let err = explain(AnalysisError::Upstream { status: 503, body: "busy".into() });
        assert_eq!(err.to_string(), "AI analysis failed: Status 503: busy");
    }
}
