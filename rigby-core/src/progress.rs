use crate::stats::{RestoreStats, StatsSnapshot};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const RENDER_INTERVAL: Duration = Duration::from_millis(500);
const VISIBLE_ACTIVE_LINES: usize = 3;
const BAR_WIDTH: usize = 20;
const MAX_FILE_LINE_LEN: usize = 88;
const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

/// Observer for scheduler events. Two renderers exist: a rate-limited live
/// terminal view and a JSON event stream; both are selected once at startup.
pub trait Progress: Send + Sync {
    /// Called once before any task runs.
    fn on_started(&self);
    fn on_file_started(&self, path: &str);
    fn on_file_completed(&self);
    fn on_file_ended(&self, path: &str);
    /// Called exactly once after reconciliation, only on success.
    fn finalize(&self, deleted_files: u64);
}

fn speed_mib(snap: &StatsSnapshot, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(0.001);
    (snap.completed_bytes as f64 / 1024.0 / 1024.0) / secs
}

fn eta_seconds(snap: &StatsSnapshot, speed: f64) -> Option<u64> {
    if speed <= 0.01 {
        return None;
    }
    let remaining = snap.bytes_total.saturating_sub(snap.completed_bytes) as f64;
    Some((remaining / (speed * 1024.0 * 1024.0)).round() as u64)
}

fn percent(snap: &StatsSnapshot) -> f64 {
    if snap.files_total == 0 {
        100.0
    } else {
        snap.completed_files as f64 * 100.0 / snap.files_total as f64
    }
}

fn format_mib(bytes: u64) -> String {
    format!("{:.1}MiB", bytes as f64 / 1024.0 / 1024.0)
}

struct Tracker {
    active: BTreeSet<String>,
    last_rendered: Option<Instant>,
}

impl Tracker {
    fn new() -> Self {
        Self { active: BTreeSet::new(), last_rendered: None }
    }

    fn due(&mut self, force: bool) -> bool {
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_rendered {
                if now.duration_since(last) < RENDER_INTERVAL {
                    return false;
                }
            }
        }
        self.last_rendered = Some(now);
        true
    }
}

// ---------------------------------------------------------------------------
// Machine-readable event stream
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartEvent<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    files_total: u64,
    bytes_total: u64,
    out_dir: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressEvent<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    percent: f64,
    files_completed: u64,
    files_total: u64,
    bytes_completed: u64,
    bytes_total: u64,
    speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    eta_seconds: Option<u64>,
    repaired_files: u64,
    verified_files: u64,
    disk_write_bytes: u64,
    reused_bytes: u64,
    active_files: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteEvent<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    files: u64,
    repaired_files: u64,
    verified_files: u64,
    deleted_files: u64,
    disk_write_bytes: u64,
    reused_bytes: u64,
    out_dir: &'a str,
}

/// Emits one JSON object per line on stdout: `start`, rate-limited
/// `progress`, and a single `complete`.
pub struct JsonProgress {
    stats: Arc<RestoreStats>,
    out_dir: String,
    started: Instant,
    tracker: Mutex<Tracker>,
}

impl JsonProgress {
    pub fn new(stats: Arc<RestoreStats>, out_dir: String) -> Self {
        Self { stats, out_dir, started: Instant::now(), tracker: Mutex::new(Tracker::new()) }
    }

    fn render(&self, force: bool) {
        let mut tracker = self.tracker.lock().unwrap();
        if !tracker.due(force) {
            return;
        }
        let snap = self.stats.snapshot();
        let speed = speed_mib(&snap, self.started.elapsed());
        let active: Vec<&str> =
            tracker.active.iter().take(VISIBLE_ACTIVE_LINES).map(|s| s.as_str()).collect();
        let event = ProgressEvent {
            ty: "progress",
            percent: percent(&snap),
            files_completed: snap.completed_files,
            files_total: snap.files_total,
            bytes_completed: snap.completed_bytes,
            bytes_total: snap.bytes_total,
            speed,
            eta_seconds: eta_seconds(&snap, speed),
            repaired_files: snap.repaired_files,
            verified_files: snap.verified_files,
            disk_write_bytes: snap.disk_write_bytes,
            reused_bytes: snap.reused_bytes,
            active_files: active,
        };
        println!("{}", serde_json::to_string(&event).unwrap());
    }
}

impl Progress for JsonProgress {
    fn on_started(&self) {
        let snap = self.stats.snapshot();
        let event = StartEvent {
            ty: "start",
            files_total: snap.files_total,
            bytes_total: snap.bytes_total,
            out_dir: &self.out_dir,
        };
        println!("{}", serde_json::to_string(&event).unwrap());
    }

    fn on_file_started(&self, path: &str) {
        self.tracker.lock().unwrap().active.insert(path.to_string());
        self.render(false);
    }

    fn on_file_completed(&self) {
        self.render(true);
    }

    fn on_file_ended(&self, path: &str) {
        self.tracker.lock().unwrap().active.remove(path);
        self.render(false);
    }

    fn finalize(&self, deleted_files: u64) {
        let snap = self.stats.snapshot();
        let event = CompleteEvent {
            ty: "complete",
            files: snap.files_total,
            repaired_files: snap.repaired_files,
            verified_files: snap.verified_files,
            deleted_files,
            disk_write_bytes: snap.disk_write_bytes,
            reused_bytes: snap.reused_bytes,
            out_dir: &self.out_dir,
        };
        println!("{}", serde_json::to_string(&event).unwrap());
    }
}

// ---------------------------------------------------------------------------
// Live terminal view
// ---------------------------------------------------------------------------

struct TermState {
    tracker: Tracker,
    rendered_lines: usize,
}

/// Multi-line stderr block rewritten in place at ~2 Hz: bar, throughput,
/// counters, ETA and a short list of in-flight paths. Stdout stays clean
/// for the final summary line.
pub struct HumanProgress {
    stats: Arc<RestoreStats>,
    out_dir: String,
    started: Instant,
    state: Mutex<TermState>,
}

impl HumanProgress {
    pub fn new(stats: Arc<RestoreStats>, out_dir: String) -> Self {
        Self {
            stats,
            out_dir,
            started: Instant::now(),
            state: Mutex::new(TermState { tracker: Tracker::new(), rendered_lines: 0 }),
        }
    }

    fn render(&self, force: bool) {
        let mut state = self.state.lock().unwrap();
        if !state.tracker.due(force) {
            return;
        }

        let snap = self.stats.snapshot();
        let elapsed = self.started.elapsed();
        let pct = percent(&snap);
        let filled = ((pct / 100.0 * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
        let bar = format!("{}{}", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled));
        let spinner =
            SPINNER_FRAMES[(elapsed.as_millis() / 180) as usize % SPINNER_FRAMES.len()];

        let completed_mib = snap.completed_bytes as f64 / 1024.0 / 1024.0;
        let total_mib = snap.bytes_total as f64 / 1024.0 / 1024.0;
        let speed = speed_mib(&snap, elapsed);
        let eta = match eta_seconds(&snap, speed) {
            Some(s) => format!("{:02}:{:02}", s / 60, s % 60),
            None => "--:--".to_string(),
        };

        let mut lines = vec![
            format!("{spinner} Rigby restore  {pct:5.1}% [{bar}]"),
            format!("  Throughput {speed:6.1} MiB/s   Data {completed_mib:.0}/{total_mib:.0} MiB"),
            format!(
                "  Files      {}/{}   Repaired {}   Verified {}",
                snap.completed_files, snap.files_total, snap.repaired_files, snap.verified_files
            ),
            format!(
                "  Storage    Write {}   Reused {}   ETA {eta}",
                format_mib(snap.disk_write_bytes),
                format_mib(snap.reused_bytes)
            ),
            "  In flight:".to_string(),
        ];
        let active: Vec<&String> =
            state.tracker.active.iter().take(VISIBLE_ACTIVE_LINES).collect();
        for i in 0..VISIBLE_ACTIVE_LINES {
            match active.get(i) {
                Some(path) => lines.push(format!("  - {}", shorten(path, MAX_FILE_LINE_LEN))),
                None => lines.push("  -".to_string()),
            }
        }

        let mut err = std::io::stderr().lock();
        if state.rendered_lines > 0 {
            let _ = write!(err, "\x1b[{}F", state.rendered_lines);
        }
        for line in &lines {
            let _ = writeln!(err, "\x1b[2K{line}");
        }
        state.rendered_lines = lines.len();
    }

    fn clear_block(&self) {
        let mut state = self.state.lock().unwrap();
        if state.rendered_lines == 0 {
            return;
        }
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\x1b[{}F", state.rendered_lines);
        for _ in 0..state.rendered_lines {
            let _ = writeln!(err, "\x1b[2K");
        }
        let _ = write!(err, "\x1b[{}F", state.rendered_lines);
        state.rendered_lines = 0;
    }
}

impl Progress for HumanProgress {
    fn on_started(&self) {
        self.render(true);
    }

    fn on_file_started(&self, path: &str) {
        self.state.lock().unwrap().tracker.active.insert(path.to_string());
        self.render(false);
    }

    fn on_file_completed(&self) {
        self.render(false);
    }

    fn on_file_ended(&self, path: &str) {
        self.state.lock().unwrap().tracker.active.remove(path);
        self.render(false);
    }

    fn finalize(&self, deleted_files: u64) {
        self.clear_block();
        let snap = self.stats.snapshot();
        println!(
            "Restore complete. files={}, repaired={}, verified={}, deleted={}, disk_write={}, reused={}, out={}",
            snap.files_total,
            snap.repaired_files,
            snap.verified_files,
            deleted_files,
            format_mib(snap.disk_write_bytes),
            format_mib(snap.reused_bytes),
            self.out_dir
        );
    }
}

fn shorten(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }
    let marker = "...";
    let keep = max_len.saturating_sub(marker.len());
    let tail_start = input.len() - keep;
    // Step forward to a char boundary so slicing never panics.
    let mut start = tail_start;
    while !input.is_char_boundary(start) {
        start += 1;
    }
    format!("{marker}{}", &input[start..])
}
