//! Watch command implementation

use anyhow::Result;

use zl_core::config::ControlConfig;
use zl_remote::{ControlChannel, ControlEndpoint, ControlEvent};

use crate::output::{format_envelope, print_error, print_info, print_success, print_warning};

/// Hold a control channel open and print what the daemon sends until Ctrl-C
pub async fn watch_command(
    settings: &ControlConfig,
    host: &str,
    port: Option<u16>,
    psk: Option<String>,
) -> Result<()> {
    let endpoint = ControlEndpoint::new(host, port.unwrap_or(settings.port)).with_psk(psk);
    print_info(&format!("Watching {}", endpoint.url(settings.secure)));

    let (channel, mut events) = ControlChannel::new(endpoint, settings.clone());
    channel.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ControlEvent::Message(envelope)) => println!("{}", format_envelope(&envelope)),
                Some(ControlEvent::StatusChanged(true)) => print_success("Connected"),
                Some(ControlEvent::StatusChanged(false)) => print_warning(&format!(
                    "Disconnected, retrying in {:?}",
                    settings.reconnect_delay
                )),
                Some(ControlEvent::Error(message)) => print_error(&message),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                print_info("Closing control channel");
                break;
            }
        }
    }

    channel.disconnect().await;
    Ok(())
}
