use anyhow::{Context, Result};
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc, time::Duration};
use throttle_sim::{router, SimConfig, SimState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_ENGINE: &str = "lourie";

#[derive(Parser, Debug)]
#[command(name = "throttle-sim", about = "Simulated locomotive controller")]
struct Args {
    #[arg(long, default_value = "")]
    addr: String,
    /// Engine id; selects the motor profile
    #[arg(long, default_value = "")]
    engine: String,
    /// Overrides the engine profile's max speed when positive
    #[arg(long, default_value_t = 0.0)]
    max_speed: f64,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value_t = 5)]
    write_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let debug = args.debug || env_true("THROTTLE_SIM_DEBUG");
    init_logging(debug);

    let addr = resolve_addr(&args.addr);
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address '{addr}'"))?;
    let config = SimConfig {
        engine: resolve_engine(&args.engine),
        max_speed: (args.max_speed > 0.0).then_some(args.max_speed),
        debug,
        write_timeout: Duration::from_secs(args.write_timeout),
    };
    let state = Arc::new(SimState::new(config));
    let engine = state.snapshot().await;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(
        event = "sim_start",
        addr = %addr,
        engine = engine.id(),
        max_speed = engine.max_speed()
    );

    let shutdown_state = state.clone();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_state.stop().await;
        info!(event = "sim_shutdown");
    };

    if let Err(err) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "sim_error", error = %err);
        return Err(err.into());
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else {
        env::var("THROTTLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_addr(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    env::var("THROTTLE_SIM_ADDR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

fn resolve_engine(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    env::var("THROTTLE_ENGINE")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENGINE.to_string())
}

fn env_true(key: &str) -> bool {
    env::var(key).map(|value| is_truthy(&value)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
