//! Geomagnetic intensity signal.
//!
//! The aurora's color ramp follows the planetary K-index. A background thread
//! polls the NOAA feed every few minutes and stores the clamped integer in an
//! [`IntensitySignal`], which the render loop reads without locking. Any
//! failure resets the signal to 0; the next tick simply tries again.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use crate::error::FetchError;

/// Highest value on the Kp scale.
pub const KP_MAX: u8 = 9;

/// Shared Kp index, always in `[0, 9]`.
///
/// Clones share the same value. Writes replace the whole value, so readers
/// never observe a partial update.
#[derive(Debug, Clone, Default)]
pub struct IntensitySignal(Arc<AtomicU8>);

impl IntensitySignal {
    pub fn new(initial: u8) -> Self {
        Self(Arc::new(AtomicU8::new(initial.min(KP_MAX))))
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    /// Store a new value, clamped to the Kp scale.
    #[inline]
    pub fn set(&self, value: u8) {
        self.0.store(value.min(KP_MAX), Ordering::Relaxed);
    }
}

/// Round a raw Kp reading up and clamp it to `[0, 9]`.
///
/// Non-finite readings count as 0.
pub fn clamp_kp(raw: f32) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.ceil().clamp(0.0, f32::from(KP_MAX)) as u8
}

/// Extract the newest Kp reading from the feed body.
///
/// The feed is a JSON table whose first row is a header. The Kp value sits in
/// the second column of the last row, as a string or a number. Rows may also
/// be objects carrying a `Kp` or `kp_index` field. A table without data rows
/// reads as 0.
pub fn parse_kp_table(body: &str) -> Result<f32, FetchError> {
    let table: Value = serde_json::from_str(body)?;
    let rows = table
        .as_array()
        .ok_or_else(|| FetchError::Parse("expected a JSON array".into()))?;

    let Some(last) = rows.last() else {
        return Ok(0.0);
    };

    let cell = match last {
        Value::Array(columns) => {
            if rows.len() <= 1 {
                // Header only
                return Ok(0.0);
            }
            columns.get(1)
        }
        Value::Object(fields) => fields.get("Kp").or_else(|| fields.get("kp_index")),
        _ => None,
    };

    let value = match cell {
        Some(Value::Number(n)) => n.as_f64().map(|v| v as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    value.ok_or_else(|| FetchError::Parse(format!("no Kp value in last row: {}", last)))
}

/// A source of raw Kp readings.
pub trait KpSource: Send + Sync {
    fn fetch(&self) -> Result<f32, FetchError>;
}

/// The NOAA planetary K-index feed over HTTP.
#[derive(Debug, Clone)]
pub struct NoaaKpSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl NoaaKpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("borealis/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl KpSource for NoaaKpSource {
    fn fetch(&self) -> Result<f32, FetchError> {
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text()?;
        parse_kp_table(&body)
    }
}

/// A fixed reading, for offline runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticKpSource(pub f32);

impl KpSource for StaticKpSource {
    fn fetch(&self) -> Result<f32, FetchError> {
        Ok(self.0)
    }
}

/// Fetch once and publish the result. Failures publish 0.
///
/// Returns the value now held by `signal`.
pub fn poll_once(source: &dyn KpSource, signal: &IntensitySignal) -> u8 {
    publish(source.fetch(), signal);
    signal.get()
}

fn publish(result: Result<f32, FetchError>, signal: &IntensitySignal) {
    match result {
        Ok(raw) => {
            let kp = clamp_kp(raw);
            log::info!("Kp index updated: {} (raw {:.2})", kp, raw);
            signal.set(kp);
        }
        Err(e) => {
            log::error!("Failed to fetch Kp index: {}", e);
            signal.set(0);
        }
    }
}

/// Background thread polling a [`KpSource`] on a fixed cadence.
///
/// Fetches run one at a time on the poller thread, so a slow request delays
/// the next tick instead of piling up. Dropping the poller stops it.
#[derive(Debug)]
pub struct IntensityPoller {
    stop_tx: Option<Sender<()>>,
    /// Held across the check and the publish, so `stop` cannot land between.
    stopped: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl IntensityPoller {
    /// Start polling immediately, then every `interval`.
    pub fn spawn(
        source: Arc<dyn KpSource>,
        signal: IntensitySignal,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let stopped = Arc::new(Mutex::new(false));
        let thread_stopped = Arc::clone(&stopped);

        let handle = thread::Builder::new()
            .name("kp-poller".into())
            .spawn(move || loop {
                let result = source.fetch();
                {
                    let stopped = lock(&thread_stopped);
                    if *stopped {
                        break;
                    }
                    publish(result, &signal);
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        log::debug!("Kp poller started, interval {:?}", interval);
        Ok(Self {
            stop_tx: Some(stop_tx),
            stopped,
            handle: Some(handle),
        })
    }

    /// Stop polling. Idempotent; does not wait for an in-flight fetch.
    ///
    /// A fetch already in flight is left to time out on its own. Once `stop`
    /// returns, nothing more reaches the signal.
    pub fn stop(&mut self) {
        *lock(&self.stopped) = true;
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
            log::debug!("Kp poller stopped");
        }
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }
}

fn lock(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    flag.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for IntensityPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct FailingSource;

    impl KpSource for FailingSource {
        fn fetch(&self) -> Result<f32, FetchError> {
            Err(FetchError::Status(500))
        }
    }

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl KpSource for CountingSource {
        fn fetch(&self) -> Result<f32, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(4.33)
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_clamp_kp() {
        assert_eq!(clamp_kp(12.4), 9);
        assert_eq!(clamp_kp(-3.0), 0);
        assert_eq!(clamp_kp(2.33), 3);
        assert_eq!(clamp_kp(4.0), 4);
        assert_eq!(clamp_kp(-0.5), 0);
        assert_eq!(clamp_kp(f32::NAN), 0);
        assert_eq!(clamp_kp(f32::INFINITY), 0);
    }

    #[test]
    fn test_signal_clamps_writes() {
        let signal = IntensitySignal::new(20);
        assert_eq!(signal.get(), 9);
        let reader = signal.clone();
        signal.set(3);
        assert_eq!(reader.get(), 3);
        signal.set(255);
        assert_eq!(reader.get(), 9);
    }

    #[test]
    fn test_parse_string_table() {
        let body = r#"[
            ["time_tag", "Kp", "a_running", "station_count"],
            ["2024-05-10 12:00:00.000", "5.67", "80", "8"],
            ["2024-05-10 15:00:00.000", "8.33", "207", "8"]
        ]"#;
        assert!((parse_kp_table(body).unwrap() - 8.33).abs() < 1e-5);
    }

    #[test]
    fn test_parse_numeric_and_object_rows() {
        assert_eq!(parse_kp_table(r#"[["t","Kp"],["x", 2.5]]"#).unwrap(), 2.5);
        assert_eq!(
            parse_kp_table(r#"[{"time_tag":"x","Kp":1.67}]"#).unwrap(),
            1.67
        );
    }

    #[test]
    fn test_parse_short_tables_read_zero() {
        assert_eq!(parse_kp_table("[]").unwrap(), 0.0);
        assert_eq!(parse_kp_table(r#"[["time_tag","Kp"]]"#).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_kp_table("<html>"), Err(FetchError::Parse(_))));
        assert!(matches!(parse_kp_table(r#"{"Kp": 3}"#), Err(FetchError::Parse(_))));
        assert!(matches!(
            parse_kp_table(r#"[["t","Kp"],["x","n/a"]]"#),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn test_poll_once_failure_resets() {
        let signal = IntensitySignal::new(6);
        assert_eq!(poll_once(&FailingSource, &signal), 0);
        assert_eq!(poll_once(&StaticKpSource(6.2), &signal), 7);
    }

    #[test]
    fn test_poller_updates_and_retries() {
        let source = Arc::new(CountingSource::default());
        let signal = IntensitySignal::new(0);
        let mut poller = IntensityPoller::spawn(
            Arc::clone(&source) as Arc<dyn KpSource>,
            signal.clone(),
            Duration::from_millis(10),
        )
        .unwrap();

        assert!(wait_for(|| source.calls.load(Ordering::SeqCst) >= 3));
        assert_eq!(signal.get(), 5);

        poller.stop();
        assert!(!poller.is_running());
        poller.stop();
    }

    #[test]
    fn test_stop_halts_polling() {
        let source = Arc::new(CountingSource::default());
        let mut poller = IntensityPoller::spawn(
            Arc::clone(&source) as Arc<dyn KpSource>,
            IntensitySignal::default(),
            Duration::from_millis(5),
        )
        .unwrap();
        assert!(wait_for(|| source.calls.load(Ordering::SeqCst) >= 1));
        poller.stop();
        thread::sleep(Duration::from_millis(20));
        let after_stop = source.calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(source.calls.load(Ordering::SeqCst), after_stop);
    }

    /// Blocks each fetch until the test lets it through.
    struct GatedSource {
        entered: Mutex<Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl KpSource for GatedSource {
        fn fetch(&self) -> Result<f32, FetchError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(7.0)
        }
    }

    #[test]
    fn test_fetch_finishing_after_stop_is_discarded() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let source = GatedSource {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let signal = IntensitySignal::new(2);
        let mut poller =
            IntensityPoller::spawn(Arc::new(source), signal.clone(), Duration::from_millis(5))
                .unwrap();
        let handle = poller.handle.take().unwrap();

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        poller.stop();
        release_tx.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(signal.get(), 2);
    }
}
