use serde::Serialize;
use std::collections::VecDeque;

/// Output screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    /// Main screen with the live preview
    Live,
    /// Sub screen for stills and reel playback
    Review,
}

/// Where presented frames go
pub trait PresentationSurface {
    fn present(&mut self, screen: Screen, pixels: &[u16]);
}

/// One `present` call as seen by a [`RecordingSurface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub screen: Screen,
    pub first_pixel: u16,
    /// Every pixel held the same value, i.e. the frame came from a single capture
    pub uniform: bool,
    pub len: usize,
}

/// Surface that keeps a summary of what it was asked to show
#[derive(Debug, Default)]
pub struct RecordingSurface {
    history: VecDeque<Presentation>,
    limit: Option<usize>,
    live_frames: u64,
    review_frames: u64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `limit` presentations
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Presentation> {
        self.history.iter()
    }

    pub fn on(&self, screen: Screen) -> impl Iterator<Item = &Presentation> {
        self.history.iter().filter(move |p| p.screen == screen)
    }

    pub fn last(&self, screen: Screen) -> Option<&Presentation> {
        self.history.iter().rev().find(|p| p.screen == screen)
    }

    pub fn frames(&self, screen: Screen) -> u64 {
        match screen {
            Screen::Live => self.live_frames,
            Screen::Review => self.review_frames,
        }
    }
}

impl PresentationSurface for RecordingSurface {
    fn present(&mut self, screen: Screen, pixels: &[u16]) {
        let first_pixel = pixels.first().copied().unwrap_or(0);
        self.history.push_back(Presentation {
            screen,
            first_pixel,
            uniform: pixels.iter().all(|p| *p == first_pixel),
            len: pixels.len(),
        });
        if let Some(limit) = self.limit {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
        match screen {
            Screen::Live => self.live_frames += 1,
            Screen::Review => self.review_frames += 1,
        }
    }
}
