// src/replay.rs
//
// Offline front end: replays recorded telemetry (.jsonl, one record per
// line) through the gesture engine and writes every emitted event as a
// JSON line next to the other outputs.

use crate::analysis::GestureEvent;
use crate::pipeline::{EventBus, GestureEngine, MetricsSummary, TickInput};
use crate::types::{CameraGrid, Config, VoiceState};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRecord {
    VoiceState {
        t_ms: u64,
        voice_id: u32,
        position: [f32; 3],
        #[serde(default)]
        size: f32,
        motion: f32,
        energy: f32,
    },
    VoiceDisconnect {
        t_ms: u64,
        voice_id: u32,
    },
    CameraZones {
        t_ms: u64,
        cam_id: u32,
        rows: usize,
        cols: usize,
        values: Vec<f32>,
    },
    GlobalMotion {
        t_ms: u64,
        value: f32,
    },
    SessionReset {
        t_ms: u64,
    },
}

impl TelemetryRecord {
    pub fn t_ms(&self) -> u64 {
        match self {
            Self::VoiceState { t_ms, .. }
            | Self::VoiceDisconnect { t_ms, .. }
            | Self::CameraZones { t_ms, .. }
            | Self::GlobalMotion { t_ms, .. }
            | Self::SessionReset { t_ms } => *t_ms,
        }
    }

    fn apply_to(self, tick: &mut TickInput) {
        match self {
            Self::VoiceState {
                voice_id,
                position,
                size,
                motion,
                energy,
                ..
            } => tick.voice_states.push(VoiceState {
                voice_id,
                position,
                size,
                motion,
                energy,
            }),
            Self::VoiceDisconnect { voice_id, .. } => tick.disconnects.push(voice_id),
            Self::CameraZones {
                cam_id,
                rows,
                cols,
                values,
                ..
            } => tick.camera_grids.push(CameraGrid {
                cam_id,
                rows,
                cols,
                values,
            }),
            // Last reading in a tick wins
            Self::GlobalMotion { value, .. } => tick.global_motion = Some(value),
            Self::SessionReset { .. } => tick.session_reset = true,
        }
    }
}

/// Output line: the event plus the tick it fired on.
#[derive(Debug, Serialize)]
struct EmittedEvent<'a> {
    t_ms: u64,
    #[serde(flatten)]
    event: &'a GestureEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub ticks: usize,
    pub events: usize,
    pub metrics: MetricsSummary,
}

pub struct ReplayProcessor {
    config: Config,
}

impl ReplayProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn find_recordings(&self) -> Result<Vec<PathBuf>> {
        let input_dir = Path::new(&self.config.replay.input_dir);
        if !input_dir.exists() {
            bail!("Recording directory {} does not exist", input_dir.display());
        }

        let wanted = self.config.replay.extension.to_lowercase();
        let mut recordings: Vec<PathBuf> = WalkDir::new(input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.to_lowercase() == wanted)
            })
            .collect();
        recordings.sort();

        info!("Found {} recordings", recordings.len());
        Ok(recordings)
    }

    /// Mirrors the recording's place under `input_dir`, so recordings that
    /// share a stem in different subdirectories never share an output file.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        let subdir = input
            .strip_prefix(&self.config.replay.input_dir)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Path::new(&self.config.replay.output_dir)
            .join(subdir)
            .join(format!("{}_gestures.jsonl", stem))
    }

    /// Run one recording through a fresh engine and write its events.
    pub fn run_recording(&self, input: &Path) -> Result<ReplayReport> {
        info!("Replaying {}", input.display());
        let ticks = read_recording(input)?;

        let output = self.output_path(input);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        let file = File::create(&output)
            .with_context(|| format!("creating output file {}", output.display()))?;
        let mut writer = BufWriter::new(file);

        let mut engine = GestureEngine::new(&self.config);
        let mut bus = EventBus::new(self.config.engine.max_pending_events);
        let mut written = 0;

        for tick in &ticks {
            let out = engine.process_tick(tick);
            for event in out.events {
                // Flush a full bus instead of letting it drop the oldest
                if bus.is_full() {
                    written += write_events(&mut writer, tick.timestamp_ms, bus.drain())?;
                }
                bus.publish(event);
            }
            written += write_events(&mut writer, tick.timestamp_ms, bus.drain())?;
        }
        writer
            .flush()
            .with_context(|| format!("writing {}", output.display()))?;

        let metrics = engine.metrics().summary();
        info!(
            "✓ {} → {} ({} ticks, {} events)",
            input.display(),
            output.display(),
            ticks.len(),
            written
        );

        Ok(ReplayReport {
            input: input.to_path_buf(),
            output,
            ticks: ticks.len(),
            events: written,
            metrics,
        })
    }
}

fn write_events<W: Write>(writer: &mut W, t_ms: u64, events: Vec<GestureEvent>) -> Result<usize> {
    for event in &events {
        serde_json::to_writer(&mut *writer, &EmittedEvent { t_ms, event })?;
        writer.write_all(b"\n")?;
    }
    Ok(events.len())
}

/// Parse a recording into ticks. Records sharing a timestamp form one tick.
pub fn read_recording(path: &Path) -> Result<Vec<TickInput>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut ticks: Vec<TickInput> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("reading {}:{}", path.display(), line_no))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: TelemetryRecord = serde_json::from_str(line)
            .with_context(|| format!("parsing {}:{}", path.display(), line_no))?;
        let t_ms = record.t_ms();

        match ticks.last_mut() {
            Some(tick) if tick.timestamp_ms == t_ms => record.apply_to(tick),
            Some(tick) if tick.timestamp_ms > t_ms => bail!(
                "{}:{} goes back in time ({}ms after {}ms)",
                path.display(),
                line_no,
                t_ms,
                tick.timestamp_ms
            ),
            _ => {
                let mut tick = TickInput::new(t_ms);
                record.apply_to(&mut tick);
                ticks.push(tick);
            }
        }
    }

    debug!("{}: {} ticks", path.display(), ticks.len());
    Ok(ticks)
}
