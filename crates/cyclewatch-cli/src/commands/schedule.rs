use clap::Subcommand;
use cyclewatch_core::cycle::definition::hms;
use cyclewatch_core::schedule::{self as core_schedule, ScheduleSource};
use cyclewatch_core::Config;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// List the loaded cycles
    Show {
        /// Print the validated schedule as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite the schedule file with the built-in default
    Regenerate,
    /// Print the schedule file location
    Path,
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let source = super::schedule_source(&config)?;

    match action {
        ScheduleAction::Show { json } => {
            let loaded = core_schedule::load(&source)?;
            for warning in &loaded.warnings {
                eprintln!("warning: {warning}");
            }
            if json {
                let definitions: Vec<_> = loaded.cycles.iter().map(|c| &c.definition).collect();
                println!("{}", serde_json::to_string_pretty(&definitions)?);
                return Ok(());
            }
            println!(
                "{:<36} {:>6} {:>9} {:>11} {:>9} {:>6}",
                "CYCLE", "MAP", "LENGTH", "RECURRENCE", "DELAY", "DAILY"
            );
            for cycle in &loaded.cycles {
                let def = &cycle.definition;
                println!(
                    "{:<36} {:>6} {:>9} {:>11} {:>9} {:>6}",
                    def.name,
                    def.map_id,
                    hms::format(def.length),
                    hms::format(def.recurrence),
                    hms::format(def.delay),
                    cycle.occurrences.len()
                );
            }
        }
        ScheduleAction::Regenerate => {
            source.regenerate()?;
            println!("Schedule regenerated at {}", source.describe());
        }
        ScheduleAction::Path => {
            println!("{}", source.path().display());
        }
    }
    Ok(())
}
