//! Sync progress reporting.
//!
//! Reports observable progress during `feedmirror sync` so users see which
//! step is running, how many channels are done, and which playlists get
//! rebuilt. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A new step of the run has started.
    Step {
        step: u8,
        total: u8,
        label: &'static str,
    },
    /// Discovery finished for another channel.
    Channel { n: u64, total: u64 },
    /// A playlist was rebuilt with `count` videos.
    Pushed { playlist: String, count: u64 },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the sync pipeline.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "[3/5] Fetching new videos...".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Step { step, total, label } => {
                format!("[{}/{}] {}...\n", step, total, label)
            }
            ProgressEvent::Channel { n, total } => {
                format!(
                    "  channels  {} / {}\n",
                    format_number(*n),
                    format_number(*total)
                )
            }
            ProgressEvent::Pushed { playlist, count } => {
                format!("  '{}'  {} videos\n", playlist, format_number(*count))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Step { step, total, label } => serde_json::json!({
                "event": "progress",
                "step": step,
                "total": total,
                "label": label
            }),
            ProgressEvent::Channel { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "channels",
                "n": n,
                "total": total
            }),
            ProgressEvent::Pushed { playlist, count } => serde_json::json!({
                "event": "progress",
                "phase": "push",
                "playlist": playlist,
                "count": count
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it into the sync run.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
