// src/main.rs

use anyhow::Result;
use crowd_gesture::replay::ReplayProcessor;
use crowd_gesture::types::Config;
use tracing::{error, info};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("🎭 Crowd gesture replay starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Voice window {}-{}ms, sweep window {}ms, eruption {:.2}→{:.2}",
        config.voice.min_window_ms,
        config.voice.max_window_ms,
        config.zone.sweep_window_ms,
        config.global.eruption_low,
        config.global.eruption_high
    );

    let processor = ReplayProcessor::new(config.clone());
    let recordings = processor.find_recordings()?;

    if recordings.is_empty() {
        error!("No recordings found in {}", config.replay.input_dir);
        return Ok(());
    }

    let mut failed = 0;
    for (idx, path) in recordings.iter().enumerate() {
        info!("========================================");
        info!(
            "Recording {}/{}: {}",
            idx + 1,
            recordings.len(),
            path.display()
        );

        match processor.run_recording(path) {
            Ok(report) => {
                info!("  Ticks: {}", report.ticks);
                info!(
                    "  Events: {} (voice {}, zone {}, global {})",
                    report.events,
                    report.metrics.voice_events,
                    report.metrics.zone_events,
                    report.metrics.global_events
                );
                if report.metrics.malformed_grids > 0 {
                    info!("  Malformed grids skipped: {}", report.metrics.malformed_grids);
                }
                info!("  Metrics: {}", serde_json::to_string(&report.metrics)?);
                info!("  Output: {}", report.output.display());
            }
            Err(e) => {
                failed += 1;
                error!("Failed to replay {}: {:#}", path.display(), e);
            }
        }
    }

    info!(
        "Done: {}/{} recordings replayed",
        recordings.len() - failed,
        recordings.len()
    );
    Ok(())
}
