//! Print the status of an Ooler and optionally change its setpoint.
//!
//! Run with: cargo run --example ooler_status -- <ADDRESS> [SETPOINT_C] [TIME_ZONE]
//!
//! `TIME_ZONE` is an IANA name such as `Europe/London`; without it the
//! system zone is used and no daylight saving offset is sent.

use ooler_rust_ble::{
    BtleplugTransport, ClockTime, Error, Ooler, Result, SessionConfig, SessionEvent,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().ok_or_else(|| Error::InvalidParameter {
        name: "address".to_string(),
        value: "<missing>".to_string(),
    })?;
    let setpoint = args
        .next()
        .map(|s| {
            s.parse::<i32>().map_err(|_| Error::InvalidParameter {
                name: "setpoint".to_string(),
                value: s.clone(),
            })
        })
        .transpose()?;
    let zone = args
        .next()
        .map(|s| {
            s.parse::<chrono_tz::Tz>().map_err(|_| Error::InvalidParameter {
                name: "time zone".to_string(),
                value: s.clone(),
            })
        })
        .transpose()?;

    println!("Ooler Status");
    println!("============\n");
    println!("Scanning for {}...\n", address);

    let transport = Arc::new(BtleplugTransport::new().await?);
    transport.scan(Duration::from_secs(5)).await?;

    let config = SessionConfig::default().with_retry(10, Duration::from_secs(1));
    let ooler = Ooler::new(transport, address.as_str(), config)?;

    let mut events = ooler.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::ConnectAttemptFailed {
                attempt,
                max_attempts,
                reason,
            } = event
            {
                println!("  connect attempt {}/{} failed: {}", attempt, max_attempts, reason);
            }
        }
    });

    if let Err(e) = ooler.connect().await {
        if e.is_connection_failure() {
            println!("Could not reach {}; is it powered and in range?", ooler.address());
        }
        return Err(e);
    }

    println!("Name:          {}", ooler.get_name().await?);
    println!("Power:         {}", if ooler.powered_on().await? { "on" } else { "off" });
    println!("Desired:       {}°C", ooler.get_desired_temperature_c().await?);
    println!("Actual:        {}°C", ooler.get_actual_temperature_c().await?);
    println!("Fan speed:     {}", ooler.get_fan_speed().await?);
    println!("Water level:   {}%", ooler.get_water_level().await?);

    if let Some(deg_c) = setpoint {
        ooler.set_desired_temperature_c(deg_c).await?;
        println!("\nSetpoint changed to {}°C", ooler.get_desired_temperature_c().await?);
    }

    let time = match zone {
        Some(zone) => ClockTime::now_in(zone),
        None => ClockTime::now_local(),
    };
    ooler.set_current_time(&time).await?;
    println!("Clock synchronized.");

    ooler.disconnect().await?;

    Ok(())
}
