mod core;
mod input;
mod power;
mod status;
#[cfg(test)]
mod tests;

pub use self::core::Pipeline;
pub use input::Button;
pub use status::{PipelineState, PipelineStatus};
