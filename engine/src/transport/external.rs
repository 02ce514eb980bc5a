use super::queue::LineQueue;
use super::TransportError;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a child gets to honour `quit` before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(1);
const EXIT_POLL: Duration = Duration::from_millis(20);

/// A UCI engine running as a child process.
pub(crate) struct ExternalProcess {
    pub(crate) path: PathBuf,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

#[tracing::instrument(level = "info", skip(outbox, running))]
pub(crate) fn spawn(
    path: &Path,
    outbox: Arc<LineQueue>,
    running: Arc<AtomicBool>,
) -> Result<ExternalProcess, TransportError> {
    tracing::debug!("Spawning engine process");
    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| {
            tracing::error!("Failed to spawn engine {}: {}", path.display(), source);
            TransportError::Spawn {
                path: path.to_path_buf(),
                source,
            }
        })?;

    let stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(TransportError::MissingPipe("stdout"))?;

    let reader = thread::Builder::new()
        .name("engine-stdout".to_string())
        .spawn(move || read_output(stdout, outbox, running))?;

    tracing::info!("Engine process spawned (pid {})", child.id());
    Ok(ExternalProcess {
        path: path.to_path_buf(),
        child: Mutex::new(child),
        stdin: Mutex::new(Some(stdin)),
        reader: Mutex::new(Some(reader)),
    })
}

/// Drain the child's stdout into the outbox, one entry per `\n`-terminated
/// line with `\r` removed.
fn read_output(stdout: ChildStdout, outbox: Arc<LineQueue>, running: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                tracing::debug!("Engine stdout EOF - engine closed");
                break;
            }
            Ok(_) => {
                buf.retain(|&b| b != b'\r' && b != b'\n');
                let line = String::from_utf8_lossy(&buf).into_owned();
                tracing::trace!("UCI << {}", line);
                outbox.push(line);
            }
            Err(e) => {
                tracing::error!("Error reading from engine stdout: {}", e);
                break;
            }
        }
    }

    running.store(false, Ordering::Release);
    outbox.wake_all();
    tracing::debug!("Output reader thread exiting");
}

impl ExternalProcess {
    pub(crate) fn write_line(&self, line: &str) {
        let mut stdin = self.stdin.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(pipe) = stdin.as_mut() else {
            tracing::debug!("Dropping command for closed engine: {}", line);
            return;
        };

        let result = pipe
            .write_all(line.as_bytes())
            .and_then(|_| pipe.write_all(b"\n"))
            .and_then(|_| pipe.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to write to engine stdin: {}", e);
        }
    }

    /// Close stdin, give the child a moment to exit, kill it otherwise, and
    /// join the reader.
    pub(crate) fn shutdown(&self) {
        self.stdin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        {
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            let deadline = Instant::now() + EXIT_GRACE;
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::debug!("Engine exited with {}", status);
                        break;
                    }
                    Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL),
                    Ok(None) => {
                        tracing::warn!("Engine ignored quit, killing pid {}", child.id());
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to query engine status: {}", e);
                        let _ = child.kill();
                        break;
                    }
                }
            }
        }

        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader {
            let _ = reader.join();
        }
    }
}

/// Find a UCI engine executable in common locations
pub fn find_engine_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    for path_str in paths {
        let path = Path::new(path_str);
        if path.exists() || path_str == "stockfish" {
            // Stockfish exits on EOF, so this returns promptly
            let status = Command::new(path_str)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if status.is_ok() {
                return Some(PathBuf::from(path_str));
            }
        }
    }

    None
}
