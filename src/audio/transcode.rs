//! Downmix/resample arbitrary input to a mono WAV with an external transcoder.
//!
//! Failure here is never fatal: callers receive `None` and fall back to
//! documented defaults.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::TranscoderConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A WAV file ready for analysis. A temporary conversion is deleted when this drops.
#[derive(Debug)]
pub struct PreparedWav {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl PreparedWav {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    sample_rate: u32,
    timeout: Duration,
    temp_dir: Option<PathBuf>,
}

impl Transcoder {
    pub fn new(config: &TranscoderConfig, sample_rate: u32) -> Self {
        Self {
            program: config.program.clone(),
            sample_rate,
            timeout: config.timeout(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// WAV input passes through untouched; anything else is converted into a temp file.
    pub fn prepare(&self, input: &Path) -> Option<PreparedWav> {
        if is_wav(input) {
            return Some(PreparedWav {
                path: input.to_path_buf(),
                temp: None,
            });
        }

        let temp = match self.temp_wav() {
            Ok(temp) => temp,
            Err(err) => {
                warn!(error = %err, "could not create temporary WAV file");
                return None;
            }
        };

        match self.run(input, &temp) {
            Ok(true) => {
                info!(input = %input.display(), "transcoded input to mono WAV");
                Some(PreparedWav {
                    path: temp.to_path_buf(),
                    temp: Some(temp),
                })
            }
            // `temp` drops here and removes the partial output.
            Ok(false) => None,
            Err(err) => {
                if err.kind() == io::ErrorKind::NotFound {
                    warn!(program = %self.program.display(), "transcoder not found");
                } else {
                    warn!(error = %err, "transcoder failed to run");
                }
                None
            }
        }
    }

    fn temp_wav(&self) -> io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vocal-analyzer-").suffix(".wav");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }

    /// Ok(true) when the transcoder exited successfully within the timeout.
    fn run(&self, input: &Path, output: &Path) -> io::Result<bool> {
        let rate = self.sample_rate.to_string();
        let child = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ar", rate.as_str(), "-ac", "1"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        match wait_with_timeout(child, self.timeout)? {
            Some(status) if status.success() => Ok(true),
            Some(status) => {
                warn!(%status, "transcoder exited with failure");
                Ok(false)
            }
            None => {
                warn!(timeout_secs = self.timeout.as_secs(), "transcoder timed out");
                Ok(false)
            }
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Returns `None` after killing the child if it outlives `timeout`.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "transcoder finished");
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
