//! Best-effort media duration probe. See SPEC_FULL.md §4.2's "Media-duration probing" note:
//! `mp4parse` for mp4/mov/m4v containers, `matroska` for mkv, bounded by a 10s timeout with the
//! actual parse run on a blocking thread. Anything that isn't a clean parse collapses to `None` —
//! this is a nicety for sorting/duplicate-detection, never a hard requirement for scanning.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe `path`'s duration in seconds, or `None` if the container is unrecognized, unreadable,
/// malformed, or the probe overran its timeout.
pub async fn probe_duration(path: &Path) -> Option<f64> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let path = path.to_owned();
    let probe = move || match extension.as_str() {
        "mp4" | "m4v" | "mov" => probe_mp4(&path),
        "mkv" => probe_mkv(&path),
        _ => None,
    };

    match tokio::time::timeout(PROBE_TIMEOUT, tokio::task::spawn_blocking(probe)).await {
        Ok(Ok(duration)) => duration,
        Ok(Err(_)) | Err(_) => None,
    }
}

fn probe_mp4(path: &Path) -> Option<f64> {
    let mut file = File::open(path).ok()?;
    let context = mp4parse::read_mp4(&mut file).ok()?;
    context
        .tracks
        .iter()
        .filter_map(|track| {
            let duration = track.duration?;
            let timescale = track.timescale?.0;
            if timescale == 0 {
                None
            } else {
                Some(duration.0 as f64 / timescale as f64)
            }
        })
        .fold(None, |best: Option<f64>, candidate| match best {
            Some(b) if b >= candidate => Some(b),
            _ => Some(candidate),
        })
}

fn probe_mkv(path: &Path) -> Option<f64> {
    let file = File::open(path).ok()?;
    let mkv = matroska::Matroska::open(file).ok()?;
    mkv.info.duration.map(|d| d.as_secs_f64())
}
