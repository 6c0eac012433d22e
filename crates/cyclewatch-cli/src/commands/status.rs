use chrono::{NaiveTime, TimeDelta};
use clap::Args;
use cyclewatch_core::cycle::definition::hms;
use cyclewatch_core::{CycleSnapshot, CycleState, NotificationPhase};

#[derive(Args)]
pub struct StatusArgs {
    /// Evaluate at this UTC time of day (HH:MM[:SS]) instead of now
    #[arg(long, value_parser = super::parse_time_of_day)]
    at: Option<NaiveTime>,
    /// Print snapshots as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rt = super::runtime()?;
    let snapshots = rt.block_on(async {
        let tracker = super::load_tracker(args.at)?;
        tracker.tick_now()?;
        let snapshots = tracker.snapshots();
        tracker.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(snapshots)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No cycles loaded.");
        return Ok(());
    }

    println!(
        "{:<36} {:<12} {:>10} {:>10}  {}",
        "CYCLE", "STATE", "TIMER", "UNTIL", "NOTIFICATION"
    );
    for snapshot in &snapshots {
        println!("{}", format_row(snapshot));
    }
    Ok(())
}

fn format_ms(ms: Option<i64>) -> String {
    match ms {
        Some(ms) => hms::format(TimeDelta::milliseconds(ms)),
        None => "--:--:--".to_string(),
    }
}

fn state_label(state: CycleState) -> String {
    match state {
        CycleState::Unknown => "UNKNOWN".to_string(),
        other => other.to_string(),
    }
}

fn format_row(snapshot: &CycleSnapshot) -> String {
    let notification = match snapshot.notification {
        NotificationPhase::Idle => "",
        NotificationPhase::Shown => "shown",
        NotificationPhase::Dismissing => "dismissing",
    };
    format!(
        "{:<36} {:<12} {:>10} {:>10}  {}",
        snapshot.name,
        state_label(snapshot.state),
        format_ms(snapshot.timer_value_ms),
        format_ms(snapshot.time_until_active_ms),
        notification
    )
}
