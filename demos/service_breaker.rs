//! Circuit breaker example demonstrating resilience patterns.
//!
//! This example shows how to:
//! - Protect a flaky dependency with a circuit breaker
//! - Watch the circuit open, refuse work and recover
//! - Serve a fallback while a service is down
//! - Share breakers through a registry built from TOML settings
//! - Report system-wide health
//!
//! Run with: cargo run --example service_breaker

use servicebreaker::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SETTINGS: &str = r#"
[defaults]
max_retries = 0

[services.players-db]
profile = "database"
failure_threshold = 3
recovery_timeout_ms = 2000

[services.geo-api]
profile = "external_api"
recovery_timeout_ms = 2000
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "servicebreaker=debug".into()),
        )
        .init();

    println!("=== Circuit Breaker Example ===\n");

    let settings = RegistrySettings::from_toml_str(SETTINGS)?;
    let shared = SharedRegistry::from_registry(settings.into_registry()?);
    let registry = shared.get();

    let db = registry.get_or_create("players-db", None);
    println!("Circuit Breaker Configuration for '{}':", db.service_name());
    println!("  Failure threshold: {}", db.config().failure_threshold);
    println!("  Recovery timeout: {:?}", db.config().recovery_timeout);
    println!("  Error rate threshold: {}", db.config().error_rate_threshold);
    println!();

    // A database that is down until `healthy` is flipped.
    let healthy = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicU32::new(0));
    let load_player = {
        let healthy = Arc::clone(&healthy);
        let calls = Arc::clone(&calls);
        ServiceOperation::new("load-player", move || {
            let healthy = healthy.load(Ordering::SeqCst);
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if healthy {
                    Ok("player #42".to_string())
                } else {
                    Err("connection refused".to_string())
                }
            }
        })
        .with_timeout(Duration::from_millis(500))
    };

    println!("Sending requests to trigger circuit breaker...\n");

    for i in 1..=6 {
        let result = registry.execute("players-db", &load_player, None).await;

        match &result.outcome {
            Ok(player) => println!("Request #{i}: loaded {player}"),
            Err(e) if e.is_unavailable() => println!("Request #{i}: rejected, {e}"),
            Err(e) => println!("Request #{i}: failed, {e}"),
        }
        println!("  Circuit state = {}", result.circuit_state);
    }

    let metrics = db.health_metrics();
    println!(
        "\nMetrics: {} total, {} success, {} failed, {} rejected, primary called {} times",
        metrics.total_requests,
        metrics.successful_requests,
        metrics.failed_requests,
        metrics.rejected_requests,
        calls.load(Ordering::SeqCst),
    );

    println!("\n=== Demonstrating Recovery ===\n");

    healthy.store(true, Ordering::SeqCst);
    println!("Database is back; waiting for the recovery timeout...");
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let result = registry.execute("players-db", &load_player, None).await;
    println!("Probe result: {:?}", result.data());
    println!("State after probe: {}", db.state());

    println!("\n=== Demonstrating Fallback ===\n");

    let geocode = ServiceOperation::new("geocode", || async {
        Err::<String, _>("upstream returned 503".to_string())
    })
    .with_fallback(|| async { Ok("cached: Lisbon, PT".to_string()) });

    for i in 1..=4 {
        let result = registry.execute("geo-api", &geocode, None).await;
        println!(
            "Request #{i}: {:?} (from fallback: {}, circuit {})",
            result.data(),
            result.from_fallback,
            result.circuit_state
        );
    }

    println!("\n=== System Health ===\n");

    let health = registry.system_health();
    println!(
        "{} services, {} healthy, {} unhealthy",
        health.total_services, health.healthy_services, health.unhealthy_services
    );
    for name in health.unhealthy() {
        println!("  unhealthy: {name}");
    }
    println!("{}", serde_json::to_string_pretty(&health)?);

    shared.reset();
    println!("\n=== Example Complete ===");
    Ok(())
}
