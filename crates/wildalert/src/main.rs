//! `wildalert` - CLI for the WildAlert live feed
//!
//! This binary watches the live detection feed, manages the signed-in session
//! record and sends manual sighting alerts.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use wildalert::alert::{AlertBanner, AlertDispatcher, AlertPanel};
use wildalert::cli::{
    AlertCommand, Cli, Command, ConfigCommand, SessionCommand, StatusCommand, WatchCommand,
};
use wildalert::device::{CaptureDevice, VideoDevice};
use wildalert::feed::{FeedController, FeedHandle, FeedRunner, FeedSnapshot, HttpFeedProbe};
use wildalert::identity::{SessionIdentity, SessionRecord, SessionStore};
use wildalert::{init_logging, Config};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use wildalert_linux as platform;

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::path::PathBuf;

    pub fn platform_name() -> &'static str {
        std::env::consts::OS
    }

    pub fn list_video_devices() -> std::io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Watch(watch_cmd) => handle_watch(&config, watch_cmd).await,
        Command::Alert(alert_cmd) => handle_alert(&config, alert_cmd).await,
        Command::Session(session_cmd) => handle_session(&config, session_cmd),
        Command::Devices => handle_devices(),
        Command::Status(StatusCommand { json }) => handle_status(&config, json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_watch(config: &Config, cmd: WatchCommand) -> CliResult {
    config.validate()?;

    let identity = if cmd.anonymous {
        None
    } else {
        Some(SessionStore::new(config.session_file()).require()?.identity())
    };

    let controller = FeedController::from_config(&config.feed)?;
    let probe = Arc::new(HttpFeedProbe::new(config.probe_timeout())?);
    let device: Arc<dyn CaptureDevice> = Arc::new(VideoDevice::new(
        cmd.device.unwrap_or_else(|| config.device.path.clone()),
    ));

    let handle = if cmd.local {
        let handle = FeedRunner::spawn(controller, probe, config.retry_interval());
        handle.start_local(Arc::clone(&device)).await?;
        handle
    } else {
        FeedRunner::mount(controller, probe, config.retry_interval(), identity.clone())
    };

    let mut panel = AlertPanel::new(
        AlertDispatcher::from_config(config)?,
        AlertBanner::new(config.display_window()),
    );

    println!("Watching on {} (type `help` for commands)", platform::platform_name());
    print_snapshot(&handle.snapshot());

    let result = watch_loop(config, &handle, &mut panel, identity.as_ref(), &device).await;
    handle.shutdown().await;
    result
}

async fn watch_loop(
    config: &Config,
    handle: &FeedHandle,
    panel: &mut AlertPanel,
    identity: Option<&SessionIdentity>,
    device: &Arc<dyn CaptureDevice>,
) -> CliResult {
    let mut snapshots = handle.subscribe();
    let mut banner = panel.banner().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot);
            }
            Ok(()) = banner.changed() => {
                let outcome = *banner.borrow_and_update();
                if outcome.sent {
                    println!("Alert sent!");
                } else if outcome.timestamp_cleared {
                    println!("(alert notice cleared)");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut words = line.split_whitespace();
                match words.next() {
                    None => {}
                    Some("retry") => handle.manual_retry().await?,
                    Some("stop") => handle.stop().await?,
                    Some("start") => handle.start(identity.cloned()).await?,
                    Some("local") => {
                        if let Err(e) = handle.start_local(Arc::clone(device)).await {
                            eprintln!("{e}");
                        }
                    }
                    Some("alert") => {
                        let animal = words.next().unwrap_or("lion").to_string();
                        let rest = words.collect::<Vec<_>>().join(" ");
                        let location = if rest.is_empty() {
                            config.alert.default_location.clone()
                        } else {
                            rest
                        };
                        if let Err(e) = panel.trigger(identity, &animal, &location).await {
                            eprintln!("{e}");
                        }
                    }
                    Some("status") => print_snapshot(&handle.snapshot()),
                    Some("quit" | "exit") => break,
                    Some("help") => print_watch_help(),
                    Some(other) => eprintln!("Unknown command: {other} (type `help`)"),
                }
            }
        }
    }
    Ok(())
}

fn print_watch_help() {
    println!("Commands:");
    println!("  retry                     Reload the feed now");
    println!("  stop                      Stop the feed");
    println!("  start                     Start the remote feed");
    println!("  local                     Switch to the local capture device");
    println!("  alert [animal] [location] Send a sighting alert");
    println!("  status                    Show the feed state");
    println!("  quit                      Leave");
}

fn print_snapshot(snapshot: &FeedSnapshot) {
    match (&snapshot.source_url, &snapshot.last_error) {
        (_, Some(error)) => println!("[{}] {error}", snapshot.state),
        (Some(url), None) => println!("[{}] {url}", snapshot.state),
        (None, None) => println!("[{}]", snapshot.state),
    }
}

async fn handle_alert(config: &Config, cmd: AlertCommand) -> CliResult {
    config.validate()?;
    let identity = SessionStore::new(config.session_file())
        .load()?
        .map(|record| record.identity());
    let location = cmd
        .location
        .unwrap_or_else(|| config.alert.default_location.clone());

    AlertDispatcher::from_config(config)?
        .send_alert(identity.as_ref(), &cmd.animal, &location)
        .await?;
    println!("Alert sent: {} at {location}", cmd.animal);
    Ok(())
}

fn handle_session(config: &Config, cmd: SessionCommand) -> CliResult {
    let store = SessionStore::new(config.session_file());
    match cmd {
        SessionCommand::Login {
            email,
            token,
            user_id,
        } => {
            let record = SessionRecord::new(token, email, user_id);
            store.save(&record)?;
            println!("Signed in as {}", record.email);
        }
        SessionCommand::Logout => {
            if store.clear()? {
                println!("Signed out.");
            } else {
                println!("No session to remove.");
            }
        }
        SessionCommand::Show { json } => match store.load()? {
            Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
            Some(record) => {
                println!("Email:      {}", record.email);
                println!("User id:    {}", record.user_id.as_deref().unwrap_or("-"));
                println!("Signed in:  {}", record.signed_in_at.to_rfc3339());
            }
            None if json => println!("null"),
            None => println!("Not signed in."),
        },
    }
    Ok(())
}

fn handle_devices() -> CliResult {
    let devices: Vec<PathBuf> = platform::list_video_devices()?;
    if devices.is_empty() {
        println!("No capture devices found.");
    }
    for device in devices {
        println!("{}", device.display());
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> CliResult {
    let session = SessionStore::new(config.session_file()).load()?;
    let feed_endpoint = FeedController::from_config(&config.feed)?
        .endpoint()
        .to_string();

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "signed_in": session.is_some(),
            "email": session.as_ref().map(|s| s.email.clone()),
            "feed_endpoint": feed_endpoint,
            "alert_base_url": config.alert.base_url,
            "session_file": config.session_file(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("wildalert status");
        println!("----------------");
        println!("Platform:      {}", platform::platform_name());
        match &session {
            Some(record) => println!("Session:       {}", record.email),
            None => println!("Session:       not signed in"),
        }
        println!("Feed:          {feed_endpoint}");
        println!("Alerts:        {}", config.alert.base_url);
        println!("Session file:  {}", config.session_file().display());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Feed]");
                println!("  Base URL:           {}", config.feed.base_url);
                println!("  Retry interval:     {} ms", config.feed.retry_interval_ms);
                println!("  Fallback email:     {}", config.feed.fallback_email);
                println!("  Probe timeout:      {} ms", config.feed.probe_timeout_ms);
                println!();
                println!("[Alert]");
                println!("  Base URL:           {}", config.alert.base_url);
                println!("  Display window:     {} ms", config.alert.display_window_ms);
                println!("  Request timeout:    {} ms", config.alert.request_timeout_ms);
                println!("  Default location:   {}", config.alert.default_location);
                println!();
                println!("[Device]");
                println!("  Path:               {}", config.device.path.display());
                println!();
                println!("[Session]");
                println!("  Session file:       {}", config.session_file().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate()) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
