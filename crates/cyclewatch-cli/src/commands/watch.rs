use chrono::NaiveTime;
use clap::Args;
use cyclewatch_core::CycleEvent;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args)]
pub struct WatchArgs {
    /// Freeze the clock at this UTC time of day (HH:MM[:SS])
    #[arg(long, value_parser = super::parse_time_of_day)]
    at: Option<NaiveTime>,
    /// Also print per-tick timer updates
    #[arg(long)]
    timers: bool,
}

/// Run the refresh loop and print events as JSON lines until Ctrl-C.
pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let tracker = super::load_tracker(args.at)?;
        let mut events = tracker.subscribe();
        tracker.start()?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        if should_print(&event, args.timers) {
                            println!("{}", serde_json::to_string(&event)?);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream lagged, {skipped} events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracker.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

fn should_print(event: &CycleEvent, timers: bool) -> bool {
    timers || !matches!(event, CycleEvent::TimerUpdated { .. })
}
