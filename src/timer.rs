//! Multi-phase stopwatch used by the protocol loop.
//!
//! A `Timer` measures the total time of a run plus the time spent in named
//! phases (`get_examples`, `training`, `classification`). Whatever is not
//! attributed to a phase ends up in `others_time` once the timer is finished.
//! `stop`/`unstop` pause the total so that work done for bookkeeping (e.g.
//! building a log line) is not charged against the time budget.
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Index, Mul};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::TeachingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Off,
    On,
    Tick,
    Stopped,
    Finished,
}

#[derive(Clone)]
pub struct Timer {
    clock: Arc<dyn Clock>,
    phases: BTreeMap<String, f64>,
    state: TimerState,
    total_time: f64,
    others_time: f64,
    t0_total: f64,
    t0_stop: f64,
    t0_phase: f64,
    current_phase: Option<String>,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Timer {
            clock,
            phases: BTreeMap::new(),
            state: TimerState::Off,
            total_time: 0.0,
            others_time: 0.0,
            t0_total: 0.0,
            t0_stop: 0.0,
            t0_phase: 0.0,
            current_phase: None,
        }
    }

    /// Reset every phase and start counting total time.
    pub fn start(&mut self) {
        self.total_time = 0.0;
        self.others_time = 0.0;
        self.t0_total = self.clock.now();
        self.phases.clear();
        self.current_phase = None;
        self.state = TimerState::On;
    }

    /// Start (or resume) counting time for `phase`.
    pub fn tick(&mut self, phase: &str) {
        if self.state == TimerState::Stopped {
            self.unstop();
        }
        assert!(
            self.state == TimerState::On,
            "cannot tick twice or tick before start"
        );
        self.t0_phase = self.clock.now();
        self.current_phase = Some(phase.to_string());
        self.state = TimerState::Tick;
    }

    /// Stop counting time for the phase opened by the last `tick`.
    pub fn tock(&mut self) {
        assert!(self.state == TimerState::Tick, "cannot tock before tick");
        let delta = self.clock.now() - self.t0_phase;
        if let Some(phase) = self.current_phase.take() {
            *self.phases.entry(phase).or_insert(0.0) += delta;
        }
        self.state = TimerState::On;
    }

    /// Pause the total time. An open phase is closed first.
    pub fn stop(&mut self) {
        assert!(
            matches!(self.state, TimerState::On | TimerState::Tick),
            "cannot stop a timer that is not running"
        );
        if self.state == TimerState::Tick {
            self.tock();
        }
        self.t0_stop = self.clock.now();
        self.state = TimerState::Stopped;
    }

    /// Resume the total time; the paused interval is not counted.
    pub fn unstop(&mut self) {
        assert!(self.state == TimerState::Stopped, "cannot unstop before stop");
        let delta = self.clock.now() - self.t0_stop;
        self.t0_total += delta;
        self.state = TimerState::On;
    }

    /// Freeze the timer and compute `others_time`.
    pub fn finish(&mut self) {
        assert!(
            matches!(
                self.state,
                TimerState::On | TimerState::Tick | TimerState::Stopped
            ),
            "cannot finish before start"
        );
        match self.state {
            TimerState::Tick => self.tock(),
            TimerState::Stopped => self.unstop(),
            _ => {}
        }
        self.total_time = self.clock.now() - self.t0_total;
        self.others_time = self.total_time - self.phases.values().sum::<f64>();
        self.state = TimerState::Finished;
    }

    pub fn elapsed(&self) -> f64 {
        match self.state {
            TimerState::Off => 0.0,
            TimerState::Finished => self.total_time,
            TimerState::Stopped => self.t0_stop - self.t0_total,
            TimerState::On | TimerState::Tick => self.clock.now() - self.t0_total,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == TimerState::Finished
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn others_time(&self) -> f64 {
        self.others_time
    }

    /// Accumulated time of `phase`, 0 when the phase never ran.
    pub fn phase(&self, phase: &str) -> f64 {
        self.phases.get(phase).copied().unwrap_or(0.0)
    }

    pub fn phases(&self) -> impl Iterator<Item = (&str, f64)> {
        self.phases.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn phase_names(&self) -> Vec<String> {
        self.phases.keys().cloned().collect()
    }

    /// Sum two finished timers. Both must carry the same phase names.
    pub fn try_add(&self, other: &Timer) -> Result<Timer, TeachingError> {
        if self.phase_names() != other.phase_names() {
            return Err(TeachingError::PhaseMismatch {
                left: self.phase_names(),
                right: other.phase_names(),
            });
        }
        let mut combined = self.frozen();
        for (name, value) in combined.phases.iter_mut() {
            *value += other.phases[name];
        }
        combined.total_time += other.total_time;
        combined.others_time += other.others_time;
        Ok(combined)
    }

    pub fn scale(&self, alpha: f64) -> Timer {
        let mut scaled = self.frozen();
        for value in scaled.phases.values_mut() {
            *value *= alpha;
        }
        scaled.total_time *= alpha;
        scaled.others_time *= alpha;
        scaled
    }

    fn frozen(&self) -> Timer {
        let mut copy = self.clone();
        copy.state = TimerState::Finished;
        copy.current_phase = None;
        copy
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("state", &self.state)
            .field("total_time", &self.total_time)
            .field("others_time", &self.others_time)
            .field("phases", &self.phases)
            .finish()
    }
}

impl Index<&str> for Timer {
    type Output = f64;

    fn index(&self, phase: &str) -> &Self::Output {
        &self.phases[phase]
    }
}

/// Panics when the phase sets differ; use `try_add` to get an error instead.
impl Add for &Timer {
    type Output = Timer;

    fn add(self, rhs: Self) -> Timer {
        match self.try_add(rhs) {
            Ok(timer) => timer,
            Err(e) => panic!("{}", e),
        }
    }
}

impl Mul<f64> for &Timer {
    type Output = Timer;

    fn mul(self, alpha: f64) -> Timer {
        self.scale(alpha)
    }
}

impl Div<f64> for &Timer {
    type Output = Timer;

    fn div(self, alpha: f64) -> Timer {
        self.scale(1.0 / alpha)
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total_time = {:.3}", self.total_time)?;
        for (name, value) in &self.phases {
            writeln!(f, "{} = {:.3}", name, value)?;
        }
        write!(f, "others_time = {:.3}", self.others_time)
    }
}
