use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const GLYPHS: [&str; 4] = ["|", "/", "-", "\\"];
pub const TICK: Duration = Duration::from_millis(100);

/// A visual indicator overlaid on a blocking operation.
///
/// `stop` must not return while the indicator can still write, so callers can
/// print freely right after it.
pub trait Progress {
    fn start(&mut self, message: &str);
    fn stop(&mut self);

    /// Stop after the overlaid operation failed.
    fn fail(&mut self) {
        self.stop();
    }
}

/// Shows nothing. Used for JSON output and non-interactive runs.
pub struct Silent;

impl Progress for Silent {
    fn start(&mut self, _message: &str) {}
    fn stop(&mut self) {}
}

struct Ticker {
    done: Sender<()>,
    handle: JoinHandle<()>,
}

/// Glyph spinner redrawn on a background thread.
///
/// At most one display thread exists per session: starting while active stops
/// the previous thread first. Stopping signals the thread over a channel and
/// joins it, then the line is cleared.
pub struct ProgressSession<W: Write + Send + 'static> {
    out: Arc<Mutex<W>>,
    interval: Duration,
    active: Option<Ticker>,
}

impl ProgressSession<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send + 'static> ProgressSession<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            interval: TICK,
            active: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl<W: Write + Send + 'static> Progress for ProgressSession<W> {
    fn start(&mut self, message: &str) {
        self.stop();

        let (done, rx) = mpsc::channel::<()>();
        let out = Arc::clone(&self.out);
        let interval = self.interval;
        let line = if message.is_empty() {
            "Please wait...".to_owned()
        } else {
            message.to_owned()
        };

        let handle = thread::spawn(move || {
            for glyph in GLYPHS.iter().cycle() {
                if let Ok(mut w) = out.lock() {
                    let _ = write!(w, "\r{glyph} {line}");
                    let _ = w.flush();
                }
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            if let Ok(mut w) = out.lock() {
                let _ = write!(w, "\r\x1b[2K");
                let _ = w.flush();
            }
        });

        self.active = Some(Ticker { done, handle });
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.active.take() {
            let _ = ticker.done.send(());
            let _ = ticker.handle.join();
        }
    }
}

impl<W: Write + Send + 'static> Drop for ProgressSession<W> {
    fn drop(&mut self) {
        self.stop();
    }
}
