//! Stage timing for the recognition loop.
//!
//! A [`PerfMonitor`] is an ordinary value owned by whoever drives the loop and
//! lent to the stages by `&mut`. Independent monitors never share data.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Accumulated timings of one named task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStats {
    pub runs: u64,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl TaskStats {
    fn record(&mut self, elapsed: Duration) {
        self.runs += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    pub fn average(&self) -> Duration {
        if self.runs == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.runs);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Default)]
struct TaskSlot {
    stats: TaskStats,
    started: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct PerfMonitor {
    tasks: HashMap<String, TaskSlot>,
    frame_started: Option<Instant>,
    frames: TaskStats,
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing `task`. Ignored if the task is already running.
    pub fn start(&mut self, task: &str) {
        let slot = self.tasks.entry(task.to_string()).or_default();
        if slot.started.is_some() {
            tracing::trace!(task, "task already started");
            return;
        }
        slot.started = Some(Instant::now());
    }

    /// Stop timing `task` and record the interval. Ignored if it was not started.
    pub fn stop(&mut self, task: &str) {
        let Some(slot) = self.tasks.get_mut(task) else {
            tracing::trace!(task, "stop for unknown task");
            return;
        };
        if let Some(started) = slot.started.take() {
            slot.stats.record(started.elapsed());
        }
    }

    /// Time `f` under `task`.
    pub fn measure<T>(&mut self, task: &str, f: impl FnOnce() -> T) -> T {
        self.start(task);
        let out = f();
        self.stop(task);
        out
    }

    pub fn start_frame(&mut self) {
        self.frame_started = Some(Instant::now());
    }

    pub fn stop_frame(&mut self) {
        if let Some(started) = self.frame_started.take() {
            self.frames.record(started.elapsed());
        }
    }

    pub fn task(&self, task: &str) -> Option<&TaskStats> {
        self.tasks.get(task).map(|slot| &slot.stats)
    }

    pub fn frames(&self) -> &TaskStats {
        &self.frames
    }

    /// Snapshot of all completed timings, slowest task (by average) first.
    pub fn report(&self) -> PerfReport {
        let mut tasks: Vec<(String, TaskStats)> = self
            .tasks
            .iter()
            .filter(|(_, slot)| slot.stats.runs > 0)
            .map(|(name, slot)| (name.clone(), slot.stats.clone()))
            .collect();
        tasks.sort_by(|a, b| b.1.average().cmp(&a.1.average()).then_with(|| a.0.cmp(&b.0)));

        PerfReport {
            frames: self.frames.clone(),
            tasks,
        }
    }

    pub fn reset(&mut self) {
        self.tasks.clear();
        self.frame_started = None;
        self.frames = TaskStats::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerfReport {
    pub frames: TaskStats,
    pub tasks: Vec<(String, TaskStats)>,
}

impl PerfReport {
    /// Frames per second derived from the average frame time.
    pub fn fps(&self) -> f64 {
        let avg = self.frames.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for PerfReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.runs == 0 && self.tasks.is_empty() {
            return write!(f, "no performance data");
        }

        writeln!(f, "--- Performance Report ---")?;
        if self.frames.runs > 0 {
            writeln!(f, "frames: {}", self.frames.runs)?;
            writeln!(
                f,
                "  min {:.2} ms  max {:.2} ms  avg {:.2} ms  {:.2} fps",
                ms(self.frames.min.unwrap_or_default()),
                ms(self.frames.max.unwrap_or_default()),
                ms(self.frames.average()),
                self.fps()
            )?;
        }
        for (name, stats) in &self.tasks {
            writeln!(
                f,
                "  {name:<20} runs {:<6} avg {:>8.2} ms  min {:>8.2} ms  max {:>8.2} ms",
                stats.runs,
                ms(stats.average()),
                ms(stats.min.unwrap_or_default()),
                ms(stats.max.unwrap_or_default()),
            )?;
        }
        write!(f, "--------------------------")
    }
}
