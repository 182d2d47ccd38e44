use std::fmt;

/// Edge-triggered user buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Shutter,
    RecordToggle,
    SwitchSensor,
    PlaybackToggle,
    StandbyToggle,
    DebugReport,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::Shutter => "shutter",
            Button::RecordToggle => "record",
            Button::SwitchSensor => "switch sensor",
            Button::PlaybackToggle => "playback",
            Button::StandbyToggle => "standby",
            Button::DebugReport => "debug report",
        };
        f.write_str(name)
    }
}
