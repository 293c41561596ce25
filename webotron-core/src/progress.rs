use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

#[cfg(not(test))]
const TICK: Duration = Duration::from_secs(5);
#[cfg(test)]
const TICK: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    stage: Arc<Mutex<String>>,
    pub files_done: Arc<AtomicU64>,
    pub files_total: Arc<AtomicU64>,
    pub bytes_done: Arc<AtomicU64>,
    pub bytes_total: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stage: Arc::new(Mutex::new(String::new())),
            files_done: Arc::new(AtomicU64::new(0)),
            files_total: Arc::new(AtomicU64::new(0)),
            bytes_done: Arc::new(AtomicU64::new(0)),
            bytes_total: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_stage(&self, s: &str) {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = s.to_string();
    }

    pub fn stage(&self) -> String {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_totals(&self, files: u64, bytes: u64) {
        self.files_total.store(files, Ordering::Relaxed);
        self.bytes_total.store(bytes, Ordering::Relaxed);
        self.files_done.store(0, Ordering::Relaxed);
        self.bytes_done.store(0, Ordering::Relaxed);
    }

    pub fn file_done(&self, bytes: u64) {
        self.files_done.fetch_add(1, Ordering::Relaxed);
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Spawn the ticker thread. No-op unless enabled.
    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        self.running.store(true, Ordering::Relaxed);
        let p = self.clone();
        // Log into whatever subscriber the caller has installed.
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        thread::spawn(move || {
            let _guard = tracing::dispatcher::set_default(&dispatch);
            let t0 = Instant::now();
            while p.running.load(Ordering::Relaxed) {
                thread::sleep(TICK);
                if !p.running.load(Ordering::Relaxed) {
                    break;
                }
                let fd = p.files_done.load(Ordering::Relaxed);
                let ft = p.files_total.load(Ordering::Relaxed);
                let bd = p.bytes_done.load(Ordering::Relaxed);
                let bt = p.bytes_total.load(Ordering::Relaxed);
                let pct = if bt > 0 { (bd as f64 / bt as f64) * 100.0 } else { 0.0 };
                info!(
                    elapsed_s = t0.elapsed().as_secs(),
                    stage = %p.stage(),
                    files = %format!("{fd}/{ft}"),
                    bytes_pct = pct as i32,
                    "sync progress"
                );
            }
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn ticker_logs_counters_through_callers_subscriber() {
        let out = Captured::default();
        let writer = out.clone();
        let sub = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(sub, || {
            let p = Progress::new(true);
            p.set_stage("Uploading");
            p.set_totals(4, 100);
            p.file_done(50);
            p.start();
            thread::sleep(TICK * 10);
            p.stop();
        });
        thread::sleep(TICK * 3);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("sync progress"), "no ticker output: {text}");
        assert!(text.contains("stage=Uploading"), "{text}");
        assert!(text.contains("files=1/4"), "{text}");
        assert!(text.contains("bytes_pct=50"), "{text}");
    }

    #[test]
    fn disabled_ticker_stays_silent() {
        let p = Progress::new(false);
        p.start();
        assert!(!p.running.load(Ordering::Relaxed));
        p.file_done(7);
        assert_eq!(p.files_done.load(Ordering::Relaxed), 1);
        assert_eq!(p.bytes_done.load(Ordering::Relaxed), 7);
    }
}
