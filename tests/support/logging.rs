use std::io::{self, Write};
use std::sync::{Arc, OnceLock};
use std::time::Duration as StdDuration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{Instant, sleep};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

const POLL_INTERVAL: StdDuration = StdDuration::from_millis(20);
const WAIT_LIMIT: StdDuration = StdDuration::from_secs(2);

/// Log sink shared by the process-wide subscriber and every capture.
#[derive(Clone, Default)]
struct SharedLog {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedLog {
    type Writer = SharedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

static SINK: OnceLock<SharedLog> = OnceLock::new();
static EXCLUSIVE: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();

/// Collects compact, uncoloured log lines emitted while it is alive. Captures in one test binary
/// take turns; the subscriber filter is fixed by the first capture.
pub struct LogCapture {
    sink: SharedLog,
    _turn: OwnedMutexGuard<()>,
}

impl LogCapture {
    pub async fn new(filter: &str) -> Self {
        let turn = EXCLUSIVE
            .get_or_init(|| Arc::new(AsyncMutex::new(())))
            .clone()
            .lock_owned()
            .await;
        let sink = SINK
            .get_or_init(|| {
                let sink = SharedLog::default();
                let subscriber = fmt::fmt()
                    .with_env_filter(EnvFilter::new(filter))
                    .with_target(false)
                    .with_ansi(false)
                    .without_time()
                    .compact()
                    .with_writer(sink.clone())
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
                sink
            })
            .clone();
        sink.bytes.lock().clear();
        Self { sink, _turn: turn }
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.sink.bytes.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Polls until at least `count` captured lines satisfy `matches`, then returns every
    /// matching line. Gives up after a short deadline and returns what it found.
    pub async fn wait_for_lines<F>(&self, count: usize, matches: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            let found: Vec<String> = self
                .lines()
                .into_iter()
                .filter(|line| matches(line))
                .collect();
            if found.len() >= count || Instant::now() >= deadline {
                return found;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}
