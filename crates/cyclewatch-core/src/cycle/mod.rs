mod clock;
pub mod definition;
mod occurrence;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use definition::{ids, CycleDefinition, CycleTable};
pub use occurrence::{OccurrenceTable, DAY};
pub use state::{
    classify, evaluate, time_of_day, time_since_active, time_until_active, timer_value,
    CycleState, Evaluation, PREPARATION_WINDOW,
};
