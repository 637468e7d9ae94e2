use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fms_ds_client::DsListener;
use fms_field::{
    Arena, ArenaConfig, InMemoryStore, LogLights, MatchStore, NullProvisioner,
    ReferenceScoreEngine,
};
use fms_webui::WebuiConfig;
use tokio::sync::broadcast;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, Parser)]
#[command(name = "fms")]
pub(crate) struct Args {
    /// Address for the operator/display web UI.
    #[clap(long, default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Address driver stations connect to.
    #[clap(long, default_value = "0.0.0.0:1750")]
    ds_addr: SocketAddr,

    /// Directory with the built frontend assets.
    #[clap(long)]
    static_dir: Option<PathBuf>,

    /// Reconfigure network hardware when teams change.
    #[clap(long, default_value = "false")]
    network: bool,

    #[clap(long, default_value = "info")]
    log_level: String,

    #[clap(long, default_value = "auto")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up log file
    let log_file_path = if args.log_file != "auto" {
        let path = PathBuf::from(args.log_file.clone());
        if path.exists() {
            eprintln!("Log file already exists: {}", path.display());
            std::process::exit(1);
        }
        path
    } else {
        let time = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = format!("fms-{time}.log");
        let path = dirs::data_local_dir()
            .map(|p| p.join("fms").join(&filename))
            .unwrap_or_else(|| PathBuf::from(&filename));
        let dir = path.parent().unwrap();
        tokio::fs::create_dir_all(dir).await.expect(&format!(
            "Failed to create log directory: {}",
            dir.display()
        ));
        path
    };

    // Create log file appender
    let appender = tracing_appender::rolling::never(
        log_file_path.parent().unwrap(),
        log_file_path.file_name().unwrap(),
    );
    let (non_blocking_appender, _guard) = tracing_appender::non_blocking(appender);

    // Set up tracing
    let log_level = match tracing::Level::from_str(&args.log_level) {
        Ok(level) => level,
        Err(_) => {
            eprintln!("Invalid log level: {}", args.log_level);
            std::process::exit(1);
        }
    };
    let stdout_layer = fmt::Subscriber::builder()
        .with_max_level(log_level)
        .without_time()
        .finish();
    let logfile_layer = fmt::Layer::default()
        .json()
        .with_ansi(false)
        .with_writer(non_blocking_appender);
    tracing::subscriber::set_global_default(stdout_layer.with(logfile_layer))
        .expect("Unable to set global tracing subscriber");

    tracing::info!("Saving logs to {}", log_file_path.display());

    let store: Arc<dyn MatchStore> = Arc::new(InMemoryStore::new());
    let arena = Arena::new(
        ArenaConfig {
            network_enabled: args.network,
            ..ArenaConfig::default()
        },
        Arc::clone(&store),
        Arc::new(ReferenceScoreEngine),
        Box::new(LogLights::new()),
        Arc::new(NullProvisioner),
    );
    let handle = arena.handle();

    let (stop_tx, _) = broadcast::channel(1);

    let arena_task = tokio::spawn(arena.run(stop_tx.subscribe()));

    let ds_listener = DsListener::bind(args.ds_addr).await?;
    let ds_task = tokio::spawn(ds_listener.run(handle.clone(), stop_tx.subscribe()));

    let webui_config = WebuiConfig {
        addr: args.http_addr,
        static_dir: args.static_dir,
    };
    let web_task = {
        let handle = handle.clone();
        let store = Arc::clone(&store);
        let stop_rx = stop_tx.subscribe();
        tokio::spawn(async move {
            if let Err(err) = fms_webui::start(webui_config, handle, store, stop_rx).await {
                tracing::error!("Web UI failed: {}", err);
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");

    tracing::info!("Shutting down");
    stop_tx.send(()).expect("Failed to send stop signal");
    arena_task.await.expect("Arena task failed");
    ds_task.await.expect("Driver station listener task failed");
    web_task.await.expect("Web UI task failed");

    Ok(())
}
