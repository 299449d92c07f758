use std::rc::Rc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use ds4_battery::config::{config_path, load_config};
use ds4_battery::{HidBackend, Plugin, TimerQueue, TracingLogger};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .context("invalid log filter")?,
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let path = config_path(std::env::args().nth(1));
    let config = load_config(path.as_deref())?;
    let settings = config.poll_settings()?;
    let deadline = config.run_for()?.map(|run_for| Instant::now() + run_for);

    let mut plugin = Plugin::new(
        HidBackend::new(),
        TimerQueue::new(),
        Rc::new(TracingLogger),
        config.vendor_id,
        config.product_id,
        settings,
    );
    plugin.load().context("battery polling not started")?;

    loop {
        let Some(next) = plugin.scheduler_mut().next_deadline() else {
            break;
        };
        if let Some(deadline) = deadline {
            if next > deadline {
                thread::sleep(deadline.saturating_duration_since(Instant::now()));
                break;
            }
        }

        thread::sleep(next.saturating_duration_since(Instant::now()));
        while let Some(token) = plugin.scheduler_mut().pop_due(Instant::now()) {
            plugin.fire(token);
        }
    }

    plugin.unload();
    Ok(())
}
