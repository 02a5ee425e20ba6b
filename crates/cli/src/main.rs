//! Headless driver for the Cutline engine.
//!
//! Imports the clips given on the command line into a single timeline and
//! plays it back against a logging surface/sink, ticking the engine from
//! a wall-clock frame loop. Useful for exercising the engine without a
//! GUI shell.

use std::time::{Duration, Instant};

use cutline_engine::{
    AudioBuffer, AudioSink, Engine, Event, Result, SourceHandle, VideoFrame, VideoSurface,
};
use tracing::info;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct LoggingSurface;

impl VideoSurface for LoggingSurface {
    fn present(&mut self, frame: &VideoFrame) {
        tracing::trace!(width = frame.width, height = frame.height, "frame presented");
    }

    fn clear(&mut self) {
        tracing::trace!("surface cleared");
    }
}

struct LoggingSink {
    started: Instant,
    next_handle: SourceHandle,
}

impl LoggingSink {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            next_handle: 0,
        }
    }
}

impl AudioSink for LoggingSink {
    fn output_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_source(
        &mut self,
        buffer: &AudioBuffer,
        when: f64,
        offset_seconds: f64,
        duration_seconds: f64,
    ) -> Result<SourceHandle> {
        self.next_handle += 1;
        info!(
            handle = self.next_handle,
            sample_rate = buffer.sample_rate,
            when,
            offset_seconds,
            duration_seconds,
            "audio source started"
        );
        Ok(self.next_handle)
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        info!(handle, "audio source stopped");
    }

    fn set_gain(&mut self, gain: f32) {
        info!(gain, "master gain set");
    }
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let workspace = match args.next() {
        Some(workspace) => workspace,
        None => {
            eprintln!("usage: cutline-cli <workspace-dir> <clip>...");
            return std::process::ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::with_ffmpeg(&workspace);
    engine.bind_video_surface(Box::new(LoggingSurface));
    engine.bind_audio_sink(Box::new(LoggingSink::new()));
    engine.set_listener(Box::new(|event| {
        if let Event::Error(payload) = event {
            tracing::warn!(kind = ?payload.kind, message = %payload.message, "playback degraded");
        }
    }));

    let mut imported = 0;
    for clip in args {
        match engine.import_video(&clip) {
            Ok(segment_id) => {
                info!(clip = %clip, segment_id, "imported");
                imported += 1;
            }
            Err(error) => {
                eprintln!("import failed for {clip}: {error}");
            }
        }
    }
    if imported == 0 {
        eprintln!("nothing to play");
        return std::process::ExitCode::FAILURE;
    }

    info!(
        total_seconds = engine.total_duration(),
        "timeline ready, starting playback"
    );
    if let Err(error) = engine.play() {
        eprintln!("playback failed to start: {error}");
        return std::process::ExitCode::FAILURE;
    }

    // Wall-clock frame loop: one engine tick per frame interval.
    let mut last_tick = Instant::now();
    while engine.is_playing() {
        std::thread::sleep(FRAME_INTERVAL);
        let now = Instant::now();
        engine.tick(now.duration_since(last_tick).as_secs_f64());
        last_tick = now;
    }

    info!(
        final_position = engine.current_position(),
        "playback finished"
    );
    std::process::ExitCode::SUCCESS
}
