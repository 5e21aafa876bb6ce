// Progress reporting for long saves and loads.

use log::debug;

/// Receives coarse progress while a map is encoded or decoded.
///
/// `fraction` is in `0.0..=1.0` within the current section; `label` names
/// the section ("saving octree...", "loading slots...", ...).
pub trait ProgressReporter {
    fn report(&mut self, fraction: f32, label: &str);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _fraction: f32, _label: &str) {}
}

/// Forwards progress to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&mut self, fraction: f32, label: &str) {
        debug!("{label} {:.0}%", fraction * 100.0);
    }
}

/// Records every report; handy for tools that render their own bar.
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    pub events: Vec<(f32, String)>,
}

impl RecordingProgress {
    pub fn labels(&self) -> Vec<&str> {
        self.events.iter().map(|(_, l)| l.as_str()).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&mut self, fraction: f32, label: &str) {
        self.events.push((fraction, label.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order() {
        let mut p = RecordingProgress::default();
        p.report(0.0, "saving map...");
        p.report(0.5, "saving octree...");
        assert_eq!(p.labels(), vec!["saving map...", "saving octree..."]);
        assert_eq!(p.events[1].0, 0.5);
    }
}
