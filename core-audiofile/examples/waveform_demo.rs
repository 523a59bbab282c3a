//! # Waveform Demo
//!
//! Opens an audio file, prints its formats and tags, reads it through once in
//! the default client format and draws the first channel's waveform as text.
//!
//! Run with:
//! ```bash
//! cargo run --example waveform_demo -- path/to/file.wav
//!
//! # RMS instead of peak, 48 columns
//! cargo run --example waveform_demo -- path/to/file.flac rms 48
//! ```

use core_audiofile::{AudioFile, AudioFileConfig, OpenOptions, ReductionStatistic};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::env;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{error, info};

const BAR_HEIGHT: usize = 8;

fn main() -> ExitCode {
    let _ = init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    );

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: waveform_demo <file> [peak|rms] [columns]");
        return ExitCode::FAILURE;
    };

    let reduction = match args.get(2).map(String::as_str) {
        Some("rms") => ReductionStatistic::Rms,
        _ => ReductionStatistic::Peak,
    };
    let columns = args
        .get(3)
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(64);

    let config = AudioFileConfig {
        waveform_points: columns,
        reduction,
        ..AudioFileConfig::default()
    };

    let mut file = match OpenOptions::new().config(config).open(path) {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, "Failed to open file");
            return ExitCode::FAILURE;
        }
    };

    println!("File:     {}", path);
    println!("Native:   {:?}", file.file_format());
    println!("Client:   {:?}", file.client_format());
    println!(
        "Length:   {} frames ({:.2}s)",
        file.total_frames(),
        file.total_duration().as_secs_f64()
    );

    let mut tags: Vec<_> = file.metadata().into_iter().collect();
    tags.sort();
    for (key, value) in tags {
        println!("  {:<14}{}", key, value);
    }

    let chunk = u32::try_from(file.config().read_chunk_frames).unwrap_or(u32::MAX);
    let mut frames = 0u64;
    loop {
        match file.read_frames(chunk) {
            Ok(read) => {
                frames += u64::from(read.frames_read);
                if read.reached_end {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Read failed");
                return ExitCode::FAILURE;
            }
        }
    }
    info!(frames, "Read through file");

    let (tx, rx) = mpsc::channel();
    file.waveform_data_async(move |summary| {
        let _ = tx.send(summary);
    });
    let Ok(summary) = rx.recv() else {
        error!("Waveform task ended without a result");
        return ExitCode::FAILURE;
    };

    if let Some(levels) = summary.channel(0) {
        for row in (0..BAR_HEIGHT).rev() {
            let threshold = row as f32 / BAR_HEIGHT as f32;
            let line: String = levels
                .iter()
                .map(|&level| if level > threshold { '#' } else { ' ' })
                .collect();
            println!("|{}|", line);
        }
    }

    ExitCode::SUCCESS
}
