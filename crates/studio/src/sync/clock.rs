//! Playback clocks for track media.
//!
//! Each track owns its own clock; nothing here is shared between tracks.
//! [`SimulatedClock`] advances with (tokio) wall time at a configurable rate,
//! so drift can be produced on purpose. [`ManualClock`] is positioned by hand
//! and can be told to fail.

use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::error::MediaError;

/// Minimal control surface of a media element.
pub trait MediaClock: Send {
    /// Playback position in seconds.
    fn current_position(&self) -> Result<f64, MediaError>;

    fn seek_to(&mut self, seconds: f64) -> Result<(), MediaError>;

    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self) -> Result<(), MediaError>;

    /// Restart from zero when the end is reached. Clocks without an end ignore it.
    fn set_looping(&mut self, _looping: bool) {}
}

/// Headless clock driven by elapsed time.
///
/// `rate` scales elapsed time: 1.0 is real time, 1.1 runs 10% fast. With a
/// duration and looping enabled, the position wraps at the end.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    rate: f64,
    duration: Option<f64>,
    looping: bool,

    /// When play was pressed (None if paused)
    start_instant: Option<Instant>,

    /// Position when play was pressed
    start_position: f64,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            duration: None,
            looping: false,
            start_instant: None,
            start_position: 0.0,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn is_running(&self) -> bool {
        self.start_instant.is_some()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    fn position(&self) -> f64 {
        let raw = match self.start_instant {
            Some(start) => self.start_position + start.elapsed().as_secs_f64() * self.rate,
            None => self.start_position,
        };

        match self.duration {
            Some(duration) if duration > 0.0 => {
                if self.looping {
                    raw % duration
                } else {
                    raw.min(duration)
                }
            }
            _ => raw,
        }
    }
}

impl MediaClock for SimulatedClock {
    fn current_position(&self) -> Result<f64, MediaError> {
        Ok(self.position())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), MediaError> {
        self.start_position = seconds.max(0.0);
        if self.start_instant.is_some() {
            self.start_instant = Some(Instant::now());
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.start_instant.is_none() {
            self.start_instant = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        if self.start_instant.is_some() {
            self.start_position = self.position();
            self.start_instant = None;
        }
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}

#[derive(Debug, Default)]
struct ManualState {
    position: f64,
    playing: bool,
    looping: bool,
    failed: bool,
    seeks: Vec<f64>,
}

/// Clock positioned explicitly. Clones share state, so a test can keep a
/// handle after giving one to the synchronizer.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: f64) -> Self {
        let clock = Self::new();
        clock.set_position(position);
        clock
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ManualState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_position(&self, position: f64) {
        self.with_state(|s| s.position = position);
    }

    pub fn position(&self) -> f64 {
        self.with_state(|s| s.position)
    }

    /// Every further call reports a media error.
    pub fn fail(&self) {
        self.with_state(|s| s.failed = true);
    }

    pub fn is_playing(&self) -> bool {
        self.with_state(|s| s.playing)
    }

    pub fn is_looping(&self) -> bool {
        self.with_state(|s| s.looping)
    }

    /// Positions this clock has been seeked to, in order.
    pub fn seeks(&self) -> Vec<f64> {
        self.with_state(|s| s.seeks.clone())
    }

    fn check(s: &ManualState) -> Result<(), MediaError> {
        if s.failed {
            Err(MediaError::new("media failed to load"))
        } else {
            Ok(())
        }
    }
}

impl MediaClock for ManualClock {
    fn current_position(&self) -> Result<f64, MediaError> {
        self.with_state(|s| Self::check(s).map(|_| s.position))
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), MediaError> {
        self.with_state(|s| {
            Self::check(s)?;
            s.position = seconds;
            s.seeks.push(seconds);
            Ok(())
        })
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.with_state(|s| {
            Self::check(s)?;
            s.playing = true;
            Ok(())
        })
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.with_state(|s| {
            Self::check(s)?;
            s.playing = false;
            Ok(())
        })
    }

    fn set_looping(&mut self, looping: bool) {
        self.with_state(|s| s.looping = looping);
    }
}
