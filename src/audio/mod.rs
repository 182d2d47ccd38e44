mod cues;
mod player;
#[cfg(test)]
mod tests;

pub use cues::{Cue, CueBank, CueSample};
pub use player::{play_until_accepted, wait_for_silence, CuePlayer, SimulatedCuePlayer};
