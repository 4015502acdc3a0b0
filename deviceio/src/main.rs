use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, trace};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;

use deviceio_model as model;
use deviceio_remote as remote;
use deviceio_util as util;

use crate::model::{Command, DeviceResult, Measurement, Param};
use crate::remote::{DeviceLink, ListenerError, RemoteConfig};
use crate::util::types::DeviceId;

fn initialize_tracing() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("debug".parse()?)
                    .add_directive("hyper=error".parse()?)
                    .add_directive("reqwest=info".parse()?),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    initialize_tracing()?;

    let cli = cli::parse();
    let device_id = cli.device_id();

    start_agent(cli.remote_config(), device_id, cli.measure).await
}

#[instrument(name = "deviceio", skip_all, err)]
async fn start_agent(
    config: RemoteConfig,
    device_id: DeviceId,
    measure: Vec<Param>,
) -> Result<(), Box<dyn Error>> {
    trace!(config = ?config, device = %device_id, "using config:");

    let link = DeviceLink::new(config);
    let channel = link.channel(device_id.clone())?;

    // Commands are taken as executed once logged, their results are
    // reported from this task rather than from the channel task
    let (executed_tx, mut executed_rx) = mpsc::unbounded_channel();
    channel.add_listener(Arc::new(
        move |commands: &[Command]| -> Result<(), ListenerError> {
            for command in commands {
                info!(
                    id = command.command_id,
                    device = %command.device_id,
                    kind = %command.kind,
                    params = ?command.params,
                    "received command"
                );
                executed_tx.send(command.clone())?;
            }
            Ok(())
        },
    ));
    channel.start()?;

    if !measure.is_empty() {
        let mut measurement = Measurement::new(device_id);
        for param in measure {
            measurement.add_param(param);
        }
        let commands = link.measurements().send_measurement(measurement).await?;
        // already acknowledged, deliver them as the channel would
        channel.listeners().dispatch(&commands);
    }

    loop {
        tokio::select! {
            command = executed_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                link.acks().send_result(&command, DeviceResult::Success).await?;
            }

            res = tokio::signal::ctrl_c() => {
                res?;
                info!("shutting down");
                break;
            }
        }
    }

    channel.close();
    channel.closed().await;

    let metrics = link.metrics();
    info!(
        sent = metrics.success_count,
        failed = metrics.error_count,
        "uploads: {:.1}% delivered",
        metrics.success_rate()
    );

    Ok(())
}
