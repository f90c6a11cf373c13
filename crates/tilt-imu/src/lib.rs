pub mod engine;
pub mod fusion;
pub mod protocol;
pub mod quat;
pub mod reference;
pub mod timing;
pub mod types;

use anyhow::Result;
use engine::OrientationEngine;
use glam::DVec3;
use protocol::ProtocolParser;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch};
use types::Orientation;

/// Commands sent to the sample processing task.
#[derive(Debug, Clone, Copy)]
enum ImuCommand {
    ResetReference,
    ResetFilter,
    SetGain(f64),
}

/// Client for a sensor sample stream.
///
/// Connects to the sample source over TCP, decodes frames, runs the
/// orientation engine, and publishes the latest snapshot.
pub struct ImuClient {
    orientation_rx: watch::Receiver<Orientation>,
    command_tx: mpsc::UnboundedSender<ImuCommand>,
    _task: tokio::task::JoinHandle<()>,
}

impl ImuClient {
    /// Connect to the sample source and start processing.
    pub async fn connect<A>(addr: A, beta: f64, axis: DVec3) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        let engine = OrientationEngine::new(beta, axis)?;

        tracing::info!(?addr, "Connecting to sample source");
        let stream = TcpStream::connect(&addr).await?;
        tracing::info!(?addr, "Connected to sample source");

        let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(sample_read_loop(stream, engine, orientation_tx, command_rx));

        Ok(Self {
            orientation_rx,
            command_tx,
            _task: task,
        })
    }

    /// Create an idle client that reports the identity pose.
    pub fn mock() -> Self {
        let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
        let (command_tx, _) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            // Keep the sender alive.
            let _tx = orientation_tx;
            tokio::signal::ctrl_c().await.ok();
        });
        Self {
            orientation_rx,
            command_tx,
            _task: task,
        }
    }

    /// Latest orientation snapshot (non-blocking).
    pub fn orientation(&self) -> Orientation {
        *self.orientation_rx.borrow()
    }

    /// Receiver that is notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Orientation> {
        self.orientation_rx.clone()
    }

    /// Make the current orientation the zero pose.
    pub fn reset_reference(&self) {
        let _ = self.command_tx.send(ImuCommand::ResetReference);
    }

    /// Restart the orientation estimate from identity, keeping the zero pose.
    pub fn reset_filter(&self) {
        let _ = self.command_tx.send(ImuCommand::ResetFilter);
    }

    /// Change the filter gain. Out-of-range values are clamped by the
    /// processing task; invalid ones are logged and ignored.
    pub fn set_gain(&self, beta: f64) {
        let _ = self.command_tx.send(ImuCommand::SetGain(beta));
    }
}

/// Background task: read TCP stream, decode frames, run the engine, publish.
async fn sample_read_loop(
    mut stream: TcpStream,
    mut engine: OrientationEngine,
    orientation_tx: watch::Sender<Orientation>,
    mut command_rx: mpsc::UnboundedReceiver<ImuCommand>,
) {
    let mut parser = ProtocolParser::new();
    let mut buf = [0u8; 4096];
    let mut sample_count: u64 = 0;

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        tracing::warn!("Sample stream closed");
                        break;
                    }
                    Ok(n) => {
                        parser.push_data(&buf[..n]);

                        // Drain all available samples.
                        while let Some(result) = parser.next_sample() {
                            let sample = match result {
                                Ok(sample) => sample,
                                Err(e) => {
                                    tracing::warn!(?e, "Dropping malformed sample");
                                    continue;
                                }
                            };
                            match engine.process(&sample) {
                                Ok(Some(orientation)) => {
                                    let _ = orientation_tx.send(orientation);
                                }
                                Ok(None) => {}
                                Err(e) => tracing::warn!(?e, "Rejected sample"),
                            }
                            sample_count += 1;
                            if sample_count % 1000 == 0 {
                                tracing::debug!(sample_count, "Samples processed");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(?e, "Sample stream read error");
                        break;
                    }
                }
            }
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    ImuCommand::ResetReference => {
                        engine.reset_reference();
                        let _ = orientation_tx.send(engine.orientation());
                    }
                    ImuCommand::ResetFilter => {
                        engine.reset_filter();
                        let _ = orientation_tx.send(engine.orientation());
                    }
                    ImuCommand::SetGain(beta) => {
                        if let Err(e) = engine.set_gain(beta) {
                            tracing::warn!(?e, "Ignoring gain command");
                        }
                    }
                }
            }
        }
    }
}
