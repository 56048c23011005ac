use std::{collections::HashMap, sync::Arc};

use ffmpeg_bus::{AvInput, FfmpegEngine};
use lite_transcode::{LogSink, Transcode, TranscodeConfig};
use tokio_util::sync::CancellationToken;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_bus", log::LevelFilter::Debug)
        .filter_module("lite_transcode", log::LevelFilter::Debug)
        .init();
}

/// Transcodes every supported stream of `input`, stopping early on cancel.
fn run(
    mut input: AvInput,
    transcode: Arc<Transcode<FfmpegEngine>>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut added = HashMap::new();
    for (index, track) in input.tracks() {
        log::info!("stream {}: {}", index, track);
        match transcode.add_track(&track) {
            Ok(()) => {
                added.insert(index, track.track_type());
            }
            Err(err) => log::warn!("stream {} not added: {}", index, err),
        }
    }
    transcode.add_track_completed();

    let mut frames = 0u64;
    while !cancel.is_cancelled() {
        let Some((index, frame)) = input.read_frame() else {
            break;
        };
        if !added.contains_key(&index) {
            continue;
        }
        if let Err(err) = transcode.input_frame(&frame) {
            log::warn!("stream {} frame at {} ms: {}", index, frame.pts(), err);
        }
        frames += 1;
    }
    transcode.flush()?;
    log::info!("{} frames read", frames);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    ffmpeg_bus::init()?;

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "scripts/test.mp4".to_string());
    let config = match args.next() {
        Some(path) => TranscodeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => TranscodeConfig::default(),
    };
    log::info!(
        "transcoding {} to {} / {}",
        url,
        config.video_target,
        config.audio_target
    );

    let input = AvInput::new(&url, None, None)?;
    let transcode = Arc::new(Transcode::new(
        Arc::new(FfmpegEngine::default()),
        config,
        Arc::new(LogSink),
    )?);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || run(input, transcode, cancel_clone));

    tokio::select! {
        result = &mut handle => return result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("ctrl+c received");
            cancel.cancel();
        }
    }
    handle.await?
}
