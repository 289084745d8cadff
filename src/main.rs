//! Console client: scan for dice and print every event as it arrives.
//! Mirrors the behavior of the original command-line test harness.

use godice::domain::settings::SettingsService;
use godice::infrastructure::logging::init_logger;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;
    let _guard = init_logger(&settings.get().log_settings)?;
    info!("starting GoDice console client");
    run()
}

#[cfg(windows)]
fn run() -> anyhow::Result<()> {
    use godice::bluetooth::winrt::WinRtPlatform;
    use godice::{DiceCallbacks, GoDiceService};
    use std::sync::Arc;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (sender, receiver) = GoDiceService::event_channel();
        let platform = Arc::new(WinRtPlatform::new(sender)?);
        let service = Arc::new(GoDiceService::new(platform));
        service.spawn_event_pump(receiver);

        // Connect to every die we see and print what it streams.
        let connector = Arc::clone(&service);
        service.subscribe(Arc::new(DiceCallbacks {
            on_found: Some(Box::new(move |id, name| {
                println!("found {id} ({name})");
                // Defer: subscriber callbacks must not re-enter the service.
                let service = Arc::clone(&connector);
                let id = id.clone();
                tokio::spawn(async move { service.connect(&id) });
            })),
            on_connected: Some(Box::new(|id| println!("{id} connected"))),
            on_connection_failed: Some(Box::new(|id| println!("{id} failed to connect"))),
            on_disconnected: Some(Box::new(|id, reason| {
                println!("{id} disconnected ({})", reason.unwrap_or("no reason"));
            })),
            on_data: Some(Box::new(|event| println!("{event:?}"))),
        }));

        service.set_listening(true)?;
        println!("scanning for dice, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
        service.set_listening(false)?;
        Ok(())
    })
}

#[cfg(not(windows))]
fn run() -> anyhow::Result<()> {
    anyhow::bail!("no BLE backend is built for this platform; only the WinRT adapter is wired up")
}
