mod stats;
mod surface;
mod sync;

pub use stats::DisplayStats;
pub use surface::{Presentation, PresentationSurface, RecordingSurface, Screen};
pub use sync::{DisplaySync, TickOutcome};
