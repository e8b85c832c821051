use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geocam::{
    ABOUT_TEXT, App, Config, create_app,
    library::write_jpeg,
    location::LocationFix,
    startup_checks,
    watermark::{WatermarkAssets, composite_watermark},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log level; falls back to `app.log_level` from the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the camera interactively (default if no command specified)
    Run {
        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Take photos without interaction and exit
    Capture {
        /// Number of photos to take
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Seconds to wait for the first location fix
        #[arg(long, default_value_t = 5)]
        wait_for_fix: u64,
    },

    /// Stamp an existing image file with a location
    Stamp {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        altitude: f64,

        #[arg(long, default_value_t = 0.0)]
        accuracy: f64,

        /// Address line; the configured placeholder when omitted
        #[arg(long)]
        address: Option<String>,
    },

    /// Show information about the application
    About,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first. Config problems are reported again once logging is up.
    let app_config = Config::load_or_default(&cli.config)
        .map(|config| config.app)
        .unwrap_or_default();
    let level = match app_config
        .effective_log_level(cli.log_level.as_deref())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level when it is set
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        Err(_) => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    match cli.command {
        Some(Commands::About) => {
            println!("{}", ABOUT_TEXT);
            Ok(())
        }
        Some(Commands::Run { quit_after }) => run_camera(cli.config, quit_after).await,
        Some(Commands::Capture {
            count,
            wait_for_fix,
        }) => capture_photos(cli.config, count, wait_for_fix).await,
        Some(Commands::Stamp {
            input,
            output,
            latitude,
            longitude,
            altitude,
            accuracy,
            address,
        }) => {
            let config = Config::load_or_default(&cli.config)?;
            let fix = LocationFix::new(latitude, longitude, altitude, accuracy);
            let address = address.unwrap_or(config.address.placeholder.clone());
            stamp_file(&config, &input, &output, fix, &address)
        }
        None => {
            // Default to run command if no subcommand specified
            run_camera(cli.config, None).await
        }
    }
}

async fn start(config_path: &Path) -> Result<App, Box<dyn std::error::Error>> {
    let config = Config::load_or_default(config_path)?;
    info!("Starting {}", config.app.name);

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    Ok(create_app(&config).await)
}

async fn run_camera(
    config_path: PathBuf,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = start(&config_path).await?;

    // Mirror the screen to the terminal
    let mut screen = app.display.subscribe();
    let screen_task = tokio::spawn(async move {
        while screen.changed().await.is_ok() {
            let shown = screen.borrow_and_update().clone();
            match shown {
                Some(photo) => println!(
                    "[screen] showing photo #{} ({}x{})",
                    photo.generation,
                    photo.image.width(),
                    photo.image.height()
                ),
                None => println!("[screen] cleared"),
            }
        }
    });

    println!("Press Enter to take a photo, 'i' for info, 'q' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal(quit_after);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "" | "c" => {
                        if let Some(stamped) = app.controller.capture_or_log().await {
                            println!(
                                "Photo taken at {} ({})",
                                stamped.taken_at.format(geocam::watermark::DATE_FORMAT),
                                stamped.address
                            );
                        }
                    }
                    "i" => println!("{}", ABOUT_TEXT),
                    "q" => break,
                    other => println!("Unknown command '{}'", other),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    screen_task.abort();
    app.shutdown().await;
    Ok(())
}

async fn capture_photos(
    config_path: PathBuf,
    count: u32,
    wait_for_fix: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = start(&config_path).await?;

    if !app.controller.is_camera_available() {
        app.shutdown().await;
        return Err("Camera is not available".into());
    }

    if app
        .location
        .wait_for_fix(Duration::from_secs(wait_for_fix))
        .await
        .is_none()
    {
        tracing::warn!(
            "No location fix after {} seconds, photos will be dropped",
            wait_for_fix
        );
    }

    let mut saved = 0;
    for _ in 0..count {
        let Some(stamped) = app.controller.capture_or_log().await else {
            continue;
        };
        match stamped.save.await {
            Ok(Some(photo)) => {
                saved += 1;
                match photo.location {
                    Some(path) => println!("Photo saved: {}", path.display()),
                    None => println!("Photo discarded by library"),
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Save task failed: {}", e),
        }
    }

    info!("{} of {} photos saved", saved, count);
    app.shutdown().await;
    Ok(())
}

fn stamp_file(
    config: &Config,
    input: &Path,
    output: &Path,
    fix: LocationFix,
    address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    fix.validate()?;

    let source = image::open(input)?;
    let assets = WatermarkAssets::load(&config.watermark.font_path, &config.watermark.logo_path);
    let taken_at = chrono::Local::now().naive_local();
    let stamped = composite_watermark(&source, &fix, address, taken_at, &assets, &config.watermark);

    let is_jpeg = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);
    if is_jpeg {
        write_jpeg(&stamped, output, 90)?;
    } else {
        stamped.save(output)?;
    }

    println!("Stamped image written to {}", output.display());
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::sleep;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!("Camera will automatically shut down after {} seconds", seconds);
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
