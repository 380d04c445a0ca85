//! kisan — weather, crop advice and chat assistant for farmers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kisan_core::{App, AppError, Language, Location, RecommendationError};
use kisan_services::{
    ChatClient, ChatWidget, CropAdvice, CropAdvisor, EmbeddedChat, HtmlHost,
    RecommendationClient, WidgetSettings,
};
use kisan_weather::{Coordinates, CurrentWeather, Forecast, IconSize, WeatherProvider};

/// Kisan command-line client
#[derive(Parser)]
#[command(name = "kisan")]
#[command(version)]
#[command(about = "Weather, crop advice and chat assistant for farmers")]
struct Args {
    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, env = "KISAN_LOG", default_value = "warn", global = true)]
    log: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current weather
    Weather {
        #[command(flatten)]
        coords: CoordArgs,
    },

    /// Show the daily forecast
    Forecast {
        #[command(flatten)]
        coords: CoordArgs,
    },

    /// Check that the weather API key works
    Check {
        #[command(flatten)]
        coords: CoordArgs,
    },

    /// Get crop recommendations for the selected (or given) location
    Recommend {
        /// Soil type (Sandy Loam, Clay, Loamy, Alluvial, Black, Red)
        #[arg(short, long)]
        soil: String,
        #[arg(long, requires = "city")]
        state: Option<String>,
        #[arg(long, requires = "state")]
        city: Option<String>,
    },

    /// Show or change the saved location
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Show or change the display language
    Language {
        #[command(subcommand)]
        action: LanguageAction,
    },

    /// Ask the chat assistant a question
    Chat {
        message: String,
    },

    /// Write an HTML page embedding the chat widget
    ChatEmbed {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Forget the saved location and language
    Reset,
}

#[derive(clap::Args)]
struct CoordArgs {
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
}

#[derive(Subcommand)]
enum LocationAction {
    Show,
    Set { state: String, city: String },
    Clear,
}

#[derive(Subcommand)]
enum LanguageAction {
    Show,
    /// Language code: en, hi or gu
    Set { code: Language },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = kisan_core::init(&args.log) {
        eprintln!("{}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            if matches!(e, AppError::Config(_)) {
                eprintln!("  {}", e);
            }
            tracing::debug!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let mut app = App::new()?;
    let json = args.json;

    match args.command {
        Command::Weather { coords } => {
            let provider = WeatherProvider::new(&app.config().weather)?;
            let coords = resolve_coords(&app, &provider, &coords).await?;
            let weather = provider.current(coords).await?;
            if json {
                print_json(&weather)?;
            } else {
                print_weather(&weather);
            }
        }
        Command::Forecast { coords } => {
            let provider = WeatherProvider::new(&app.config().weather)?;
            let coords = resolve_coords(&app, &provider, &coords).await?;
            let forecast = provider.forecast(coords).await?;
            if json {
                print_json(&forecast)?;
            } else {
                print_forecast(&forecast);
            }
        }
        Command::Check { coords } => {
            let provider = WeatherProvider::new(&app.config().weather)?;
            let coords = resolve_coords(&app, &provider, &coords).await?;
            let check = provider.check(coords).await;
            println!("{}", check.message);
        }
        Command::Recommend { soil, state, city } => {
            let config = app.config();
            let advisor = CropAdvisor::new(
                WeatherProvider::new(&config.weather)?,
                RecommendationClient::new(&config.backend)?,
            );

            let advice = match (state, city) {
                (Some(state), Some(city)) => advisor.advise(&state, &city, &soil).await?,
                _ => {
                    let location = app.session().location().cloned().ok_or_else(|| {
                        RecommendationError::InvalidInput("Please select a state".to_string())
                    })?;
                    advisor.advise_at(&location, &soil).await?
                }
            };

            if json {
                print_json(&advice)?;
            } else {
                print_advice(&advice);
            }
        }
        Command::Location { action } => match action {
            LocationAction::Show => match app.session().location() {
                Some(location) => println!("{}", location),
                None => println!("No location selected"),
            },
            LocationAction::Set { state, city } => {
                let location = Location::new(state, city)
                    .map_err(|e| RecommendationError::InvalidInput(e.to_string()))?;
                app.session_mut().select_location(location)?;
                if let Some(location) = app.session().location() {
                    println!("Location set to {}", location);
                }
            }
            LocationAction::Clear => {
                app.session_mut().clear_location()?;
                println!("Location cleared");
            }
        },
        Command::Language { action } => match action {
            LanguageAction::Show => {
                let lang = app.session().language();
                println!("{} ({} / {})", lang.code(), lang.name(), lang.native_name());
            }
            LanguageAction::Set { code } => {
                app.session_mut().select_language(code)?;
                println!("Language set to {}", code.name());
            }
        },
        Command::Chat { message } => {
            let mut client = ChatClient::new(&app.config().backend)?;
            let reply = client.send(&message).await?;
            println!("{}", reply);
        }
        Command::ChatEmbed { out } => {
            let mut chat =
                EmbeddedChat::new(HtmlHost::new(), WidgetSettings::from(&app.config().chat));
            chat.open_chat();
            let html = chat.into_host().render("Kisan Chat Assistant");

            match out {
                Some(path) => {
                    std::fs::write(&path, html)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", html),
            }
        }
        Command::Reset => {
            app.session_mut().reset()?;
            println!("Preferences reset");
        }
    }

    Ok(())
}

/// Explicit coordinates, else the saved location, else the configured default.
async fn resolve_coords(
    app: &App,
    provider: &WeatherProvider,
    args: &CoordArgs,
) -> Result<Coordinates, AppError> {
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        return Ok(Coordinates::new(lat, lon));
    }

    if let Some(location) = app.session().location() {
        return Ok(provider.geocode(location).await?);
    }

    let weather = &app.config().weather;
    Ok(Coordinates::new(weather.default_lat, weather.default_lon))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{}", text);
    Ok(())
}

fn print_weather(weather: &CurrentWeather) {
    if let Some(name) = &weather.name {
        println!("{}", name);
    }
    if let Some(condition) = weather.primary() {
        println!("  {} ({})", condition.description, condition.category().description());
        println!(
            "  Icon: {}",
            WeatherProvider::icon_url(&condition.icon, IconSize::Medium)
        );
    }
    println!(
        "  Temperature: {:.1}°C (feels like {:.1}°C)",
        weather.main.temp, weather.main.feels_like
    );
    println!(
        "  Min/Max: {:.1}°C / {:.1}°C",
        weather.main.temp_min, weather.main.temp_max
    );
    println!("  Humidity: {}%", weather.main.humidity);
    println!("  Wind: {:.1} km/h", weather.wind.speed_kmh());
    if let (Some(rise), Some(set)) = (weather.sunrise(), weather.sunset()) {
        println!(
            "  Sunrise/Sunset: {} / {} UTC",
            rise.format("%H:%M"),
            set.format("%H:%M")
        );
    }
}

fn print_forecast(forecast: &Forecast) {
    println!("{}", forecast.place);
    for day in &forecast.days {
        let date = day
            .date()
            .map_or_else(|| day.dt.to_string(), |d| d.format("%a %d %b").to_string());
        let summary = day
            .weather
            .first()
            .map_or("unknown", |c| c.description.as_str());
        println!(
            "  {}: {:.0}°C / {:.0}°C, {}",
            date, day.temp_max, day.temp_min, summary
        );
    }
}

fn print_advice(advice: &CropAdvice) {
    println!(
        "Weather: {}, {:.1}°C, humidity {}%",
        advice.weather.condition, advice.weather.temp, advice.weather.humidity
    );
    for rec in &advice.recommendations {
        println!();
        println!("{}", rec.crop);
        println!("  {}", rec.advice);
        if let Some(conditions) = &rec.conditions {
            if let (Some(weather), Some(temp)) = (&conditions.weather, &conditions.temperature) {
                println!("  Conditions: {} at {}", weather, temp);
            }
            if let Some(soil) = &conditions.soil {
                println!("  Soil: {}", soil);
            }
        }
    }
}
