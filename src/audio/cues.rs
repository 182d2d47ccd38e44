use crate::config::AudioConfig;
use crate::error::AudioError;
use std::fmt;
use tracing::{debug, info};

/// Samples used when no cue file is configured
const SILENT_CUE_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Shutter,
    RecordBegin,
    RecordEnd,
}

impl Cue {
    pub fn name(self) -> &'static str {
        match self {
            Cue::Shutter => "shutter",
            Cue::RecordBegin => "record_begin",
            Cue::RecordEnd => "record_end",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sample data for one cue, loaded once at startup
#[derive(Debug, Clone)]
pub struct CueSample {
    pub cue: Cue,
    pub data: Vec<u8>,
}

impl CueSample {
    pub fn silent(cue: Cue) -> Self {
        Self {
            cue,
            data: vec![0; SILENT_CUE_BYTES],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The three cues the mode manager plays
#[derive(Debug, Clone)]
pub struct CueBank {
    shutter: CueSample,
    begin: CueSample,
    end: CueSample,
}

impl CueBank {
    pub fn silent() -> Self {
        Self {
            shutter: CueSample::silent(Cue::Shutter),
            begin: CueSample::silent(Cue::RecordBegin),
            end: CueSample::silent(Cue::RecordEnd),
        }
    }

    /// Read configured cue files; cues without a file stay silent
    pub fn load(config: &AudioConfig) -> Result<Self, AudioError> {
        let bank = Self {
            shutter: load_sample(Cue::Shutter, config.shutter_cue.as_deref())?,
            begin: load_sample(Cue::RecordBegin, config.begin_cue.as_deref())?,
            end: load_sample(Cue::RecordEnd, config.end_cue.as_deref())?,
        };
        info!(
            "Cue bank ready (shutter {} bytes, begin {} bytes, end {} bytes)",
            bank.shutter.len(),
            bank.begin.len(),
            bank.end.len()
        );
        Ok(bank)
    }

    pub fn sample(&self, cue: Cue) -> &CueSample {
        match cue {
            Cue::Shutter => &self.shutter,
            Cue::RecordBegin => &self.begin,
            Cue::RecordEnd => &self.end,
        }
    }
}

fn load_sample(cue: Cue, path: Option<&str>) -> Result<CueSample, AudioError> {
    let Some(path) = path else {
        return Ok(CueSample::silent(cue));
    };

    let data = std::fs::read(path).map_err(|source| AudioError::Load {
        path: path.to_string(),
        source,
    })?;
    debug!("Loaded {} cue from {} ({} bytes)", cue, path, data.len());
    Ok(CueSample { cue, data })
}
