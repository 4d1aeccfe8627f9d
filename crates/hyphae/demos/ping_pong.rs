//! Two actors trading a ball over request/response while a scoreboard
//! listens on a pub/sub topic.
//!
//! Run with `RUST_LOG=hyphae=debug cargo run --example ping_pong` to see
//! the bus's own logs.

use anyhow::Result;
use hyphae::{parallel_for, Actor, BusConfig, MessageBus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Ball {
    rally: u32,
}

#[derive(Debug, Clone)]
struct Score {
    rally: u32,
    hitter: &'static str,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = BusConfig::from_toml_str(
        r#"
        thread_name_prefix = "demo"
        request_timeout_ms = 1000
        "#,
    )?;
    let bus = MessageBus::with_config(config)?;

    let ping = Actor::new("ping", &bus)?;
    let pong = Actor::new("pong", &bus)?;
    let scoreboard = Actor::new("scoreboard", &bus)?;

    let scores = pong.add_publisher("scores")?;
    let rallies = Arc::new(Mutex::new(Vec::new()));
    let board = Arc::clone(&rallies);
    scoreboard.add_subscriber("scores", move |score: Arc<Score>| {
        info!(rally = score.rally, hitter = score.hitter, "Point");
        board.lock().push(score.rally);
    })?;

    pong.add_response("serve", |ball: Arc<Ball>| Ball {
        rally: ball.rally + 1,
    })?;

    let returned = Arc::new(Mutex::new(Vec::new()));
    let caught = Arc::clone(&returned);
    let serve = ping.add_request("serve", "ping", move |_sent: Arc<Ball>, back: Arc<Ball>| {
        info!(rally = back.rally, "Ball returned");
        caught.lock().push(back.rally);
    })?;

    for rally in 0..10 {
        ping.send_request(serve, Ball { rally });
    }

    pong.flush(Duration::from_secs(5))?;
    ping.flush(Duration::from_secs(5))?;

    for rally in returned.lock().iter().copied() {
        pong.send_message(
            scores,
            Score {
                rally,
                hitter: "pong",
            },
        );
    }
    scoreboard.flush(Duration::from_secs(5))?;

    // Crunch the rally numbers off the actor threads
    let total = AtomicU64::new(0);
    parallel_for(
        0,
        1_000,
        |begin, end| {
            let sum: u64 = (begin as u64..end as u64).sum();
            total.fetch_add(sum, Ordering::Relaxed);
        },
        hyphae::available_concurrency(),
    );

    info!(
        returned = returned.lock().len(),
        scored = rallies.lock().len(),
        checksum = total.load(Ordering::Relaxed),
        "Match finished"
    );
    bus.metrics().print_summary("ping-pong");

    Ok(())
}
