use anyhow::Result;
use std::time::Duration;
use tilt_config::AppConfig;
use tilt_imu::ImuClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Operator commands read from stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Zero,
    Reset,
    Gain(f64),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next()? {
        "zero" | "z" => Command::Zero,
        "reset" | "r" => Command::Reset,
        "gain" | "g" => Command::Gain(parts.next()?.parse().ok()?),
        "quit" | "q" => Command::Quit,
        _ => return None,
    };
    // Trailing junk makes the command ambiguous.
    if parts.next().is_some() {
        return None;
    }
    Some(cmd)
}

fn display_period(refresh_hz: f64) -> Duration {
    if refresh_hz.is_finite() && refresh_hz > 0.0 {
        Duration::from_secs_f64(1.0 / refresh_hz)
    } else {
        warn!(refresh_hz, "Invalid refresh rate, using 10 Hz");
        Duration::from_millis(100)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tilt_app=info,tilt_imu=info,tilt_config=info".into()),
        )
        .init();

    info!("Tilt monitor starting");

    // Load config.
    let config = tilt_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    info!(
        beta = config.imu.madgwick_beta,
        axis = ?config.imu.reference_axis,
        source = %config.source.address,
        "Config loaded"
    );

    // Connect to the sample source (fall back to mock if nothing is listening).
    let imu_client = match ImuClient::connect(
        config.source.address.as_str(),
        config.imu.madgwick_beta,
        config.imu.reference_axis,
    )
    .await
    {
        Ok(client) => {
            info!("Sample source connected");
            client
        }
        Err(e) => {
            warn!(?e, "Sample source not available, using mock (no tracking)");
            ImuClient::mock()
        }
    };

    info!("Commands: zero | reset | gain <beta> | quit");

    let mut ticker = tokio::time::interval(display_period(config.display.refresh_hz));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_shown = None;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let o = imu_client.orientation();
                if last_shown == Some(o) {
                    continue;
                }
                last_shown = Some(o);
                let [w, x, y, z] = tilt_imu::quat::to_wxyz(o.quaternion);
                info!(
                    w = format!("{w:+.4}"),
                    x = format!("{x:+.4}"),
                    y = format!("{y:+.4}"),
                    z = format!("{z:+.4}"),
                    angle_deg = format!("{:+.2}", o.angle_degrees),
                    "Orientation"
                );
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Some(Command::Zero) => imu_client.reset_reference(),
                        Some(Command::Reset) => imu_client.reset_filter(),
                        Some(Command::Gain(beta)) => imu_client.set_gain(beta),
                        Some(Command::Quit) => break,
                        None if line.trim().is_empty() => {}
                        None => warn!(%line, "Unknown command"),
                    },
                    Ok(None) => {
                        // stdin closed; keep displaying until Ctrl-C.
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(?e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Tilt monitor shutting down");
    Ok(())
}
