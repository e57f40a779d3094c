use std::path::Path;
use std::time::Duration;

use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::process::{CommandRunner, CommandSpec};

/// Probe the container duration of an audio file in seconds.
pub async fn probe_duration(
    runner: &dyn CommandRunner,
    ffprobe: &str,
    path: &Path,
    timeout: Option<Duration>,
) -> LipsyncResult<f64> {
    let spec = CommandSpec::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .timeout(timeout);

    let out = runner.run(&spec).await?;
    if !out.success() {
        return Err(LipsyncError::media(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            out.stderr_lossy()
        )));
    }

    parse_probe_duration(&out.stdout)
}

pub(crate) fn parse_probe_duration(stdout: &[u8]) -> LipsyncResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(stdout)
        .map_err(|e| LipsyncError::media(format!("ffprobe json parse failed: {e}")))?;
    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| LipsyncError::media("ffprobe reported no duration"))?;
    let secs = duration
        .trim()
        .parse::<f64>()
        .map_err(|e| LipsyncError::media(format!("invalid duration '{duration}': {e}")))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(LipsyncError::media(format!(
            "audio duration must be > 0 (got {secs})"
        )));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_duration() {
        let json = br#"{"format": {"filename": "a.mp3", "duration": "2.000000"}}"#;
        assert!((parse_probe_duration(json).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_or_zero_duration_is_an_error() {
        assert!(parse_probe_duration(br#"{"format": {}}"#).is_err());
        assert!(parse_probe_duration(br#"{}"#).is_err());
        assert!(parse_probe_duration(br#"{"format": {"duration": "0.0"}}"#).is_err());
        assert!(parse_probe_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_probe_duration(b"not json").is_err());
    }
}
