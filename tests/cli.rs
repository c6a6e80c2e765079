use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use vocal_analyzer::audio::encoder::{encode_audio, WavEncoding};
use vocal_analyzer::types::AudioData;

const SAMPLE_RATE: u32 = 22_050;

fn analyzer() -> Command {
    let mut cmd = Command::cargo_bin("vocal-analyzer").expect("binary built");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Sung-note stand-in: a 220 Hz tone with a gentle 4 Hz amplitude pulse.
fn write_take(dir: &Path, name: &str, frequency: f64) -> Result<PathBuf> {
    let total = SAMPLE_RATE as usize;
    let samples = (0..total)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            let envelope = 0.6 + 0.3 * (2.0 * std::f64::consts::PI * 4.0 * t).sin();
            (envelope * (2.0 * std::f64::consts::PI * frequency * t).sin() * 0.5) as f32
        })
        .collect();
    let path = dir.join(name);
    encode_audio(
        &AudioData {
            samples,
            sample_rate: SAMPLE_RATE,
        },
        &path,
        WavEncoding::Pcm16,
    )?;
    Ok(path)
}

fn stdout_json(output: &std::process::Output) -> Result<Value> {
    let text = String::from_utf8(output.stdout.clone())?;
    assert_eq!(text.trim_end().lines().count(), 1, "stdout: {text}");
    Ok(serde_json::from_str(text.trim_end())?)
}

#[test]
fn missing_audio_path_reports_failure() {
    analyzer()
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(r#""success":false"#))
        .stdout(predicate::str::contains(r#""error":"#));
}

#[test]
fn analyses_wav_without_reference() -> Result<()> {
    let dir = TempDir::new()?;
    let take = write_take(dir.path(), "take.wav", 220.0)?;

    let output = analyzer().arg(&take).output()?;
    assert!(output.status.success());
    let report = stdout_json(&output)?;

    assert_eq!(report["success"], Value::Bool(true));
    assert_eq!(report["audio_path"], Value::String(take.display().to_string()));
    for category in ["pitch", "rhythm", "voice", "timbre", "energy"] {
        assert!(report["features"][category].is_object(), "{category}: {report}");
    }
    assert_eq!(
        report["features"]["comparison"],
        serde_json::json!({ "has_reference": false })
    );
    assert!(report["features"]["voice"].get("note").is_none());
    for field in ["overall", "pitch", "rhythm", "voice", "breath"] {
        let score = report["scores"][field].as_f64().expect("numeric score");
        assert!((0.0..=100.0).contains(&score), "{field}={score}");
    }
    Ok(())
}

#[test]
fn reference_adds_comparison_scores() -> Result<()> {
    let dir = TempDir::new()?;
    let take = write_take(dir.path(), "take.wav", 220.0)?;
    let reference = write_take(dir.path(), "reference.wav", 247.0)?;

    let output = analyzer().arg(&take).arg(&reference).output()?;
    assert!(output.status.success());
    let comparison = stdout_json(&output)?["features"]["comparison"].clone();

    assert_eq!(comparison["has_reference"], Value::Bool(true));
    assert!(comparison["dtw_distance"].as_f64().is_some());
    let similarity = comparison["similarity_score"].as_f64().expect("similarity");
    assert!((0.0..=100.0).contains(&similarity));
    Ok(())
}

#[test]
fn unreadable_reference_is_isolated() -> Result<()> {
    let dir = TempDir::new()?;
    let take = write_take(dir.path(), "take.wav", 220.0)?;

    let output = analyzer()
        .arg(&take)
        .arg(dir.path().join("missing.wav"))
        .output()?;
    assert!(output.status.success());
    let report = stdout_json(&output)?;
    let comparison = &report["features"]["comparison"];
    assert_eq!(comparison["has_reference"], Value::Bool(false));
    assert!(comparison["error"].is_string());
    assert!(report["features"]["pitch"].get("error").is_none());
    Ok(())
}

#[test]
fn unavailable_transcoder_degrades_voice_to_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let take = write_take(dir.path(), "take.flac", 220.0)?;
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        r#"{"transcoder": {"program": "/nonexistent/vocal-analyzer-ffmpeg"}}"#,
    )?;

    let output = analyzer()
        .arg(&take)
        .arg("--config")
        .arg(&config)
        .output()?;
    assert!(output.status.success());
    let voice = stdout_json(&output)?["features"]["voice"].clone();

    assert!(voice.get("error").is_none(), "{voice}");
    assert!(voice["note"].is_string());
    assert_eq!(voice["voice_score"].as_f64(), Some(65.0));
    assert_eq!(voice["voice_quality"], Value::String("良好".to_string()));
    assert_eq!(voice["jitter"].as_f64(), Some(0.02));
    Ok(())
}

/// Browser uploads are Opus in WebM; a stand-in transcoder supplies the WAV.
#[cfg(unix)]
#[test]
fn webm_upload_is_analysed_through_the_transcoder() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let converted = write_take(dir.path(), "converted.wav", 220.0)?;
    let upload = dir.path().join("recording_1700000000000.webm");
    std::fs::write(&upload, b"\x1a\x45\xdf\xa3 webm container with opus frames")?;

    let script = dir.path().join("fake-ffmpeg");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nfor out; do :; done\ncp '{}' \"$out\"\n",
            converted.display()
        ),
    )?;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch)?;
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        serde_json::json!({ "transcoder": { "program": script, "temp_dir": scratch } })
            .to_string(),
    )?;

    let output = analyzer()
        .arg(&upload)
        .arg("--config")
        .arg(&config)
        .output()?;
    assert!(output.status.success());
    let report = stdout_json(&output)?;
    for category in ["pitch", "rhythm", "voice", "timbre", "energy"] {
        assert!(
            report["features"][category].get("error").is_none(),
            "{category}: {report}"
        );
    }
    assert!(report["features"]["voice"].get("note").is_none());
    let mean_pitch = report["features"]["pitch"]["mean_pitch"]
        .as_f64()
        .expect("mean pitch");
    assert!(mean_pitch > 0.0, "{report}");
    assert_eq!(std::fs::read_dir(&scratch)?.count(), 0, "temporary WAV left behind");
    Ok(())
}

#[test]
fn undecodable_audio_still_yields_a_scored_report() -> Result<()> {
    let dir = TempDir::new()?;
    let garbage = dir.path().join("noise.wav");
    std::fs::write(&garbage, b"definitely not audio")?;

    let output = analyzer().arg(&garbage).output()?;
    assert!(output.status.success());
    let report = stdout_json(&output)?;
    assert_eq!(report["success"], Value::Bool(true));
    for category in ["pitch", "rhythm", "voice", "timbre", "energy"] {
        assert!(report["features"][category]["error"].is_string(), "{category}");
    }
    assert_eq!(report["scores"]["overall"].as_f64(), Some(70.0));
    Ok(())
}

#[test]
fn invalid_config_is_a_top_level_failure() -> Result<()> {
    let dir = TempDir::new()?;
    let take = write_take(dir.path(), "take.wav", 220.0)?;
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"scoring": {"pitch_weight": 0.9}}"#)?;

    analyzer()
        .arg(&take)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""success":false"#))
        .stdout(predicate::str::contains("sum to 1.0"));
    Ok(())
}
