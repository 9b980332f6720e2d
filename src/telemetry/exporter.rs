//! Periodic batch exporter.
//!
//! # Phases
//! ```text
//! Idle → Running → Stopping → Stopped
//! ```
//!
//! `start` arms the timer and spawns the flush task. `stop` disarms it and
//! waits for an in-flight flush; it does not flush what is still buffered.
//! Samples added once stopping has begun are discarded.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ExportSettings;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::telemetry::buffer::SampleBuffer;
use crate::telemetry::record::{Batch, TelemetryRecord, WireFormat};
use crate::telemetry::sample::{
    unix_nanos, HttpTrail, Sample, TAG_GROUP, TAG_METHOD, TAG_SCENARIO, TAG_STATUS, TAG_URL,
};
use crate::telemetry::transport::{HttpTransport, Payload, Transport};
use crate::telemetry::types::{ExportError, ExportResult};

/// Observable lifecycle phase of an exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterPhase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

enum State {
    Idle,
    Running {
        shutdown: Shutdown,
        task: JoinHandle<()>,
    },
    Stopping,
    Stopped,
}

/// State shared between producers and the flush task.
struct Shared {
    buffer: SampleBuffer,
    transport: Arc<dyn Transport>,
    format: WireFormat,
    test_run_id: i64,
}

/// Buffers HTTP trails and uploads them in batches on a fixed interval.
pub struct PeriodicExporter {
    shared: Arc<Shared>,
    state: Mutex<State>,
    /// Flips to `true` once the exporter reaches `Stopped`.
    stopped: watch::Sender<bool>,
}

impl PeriodicExporter {
    pub fn new(transport: Arc<dyn Transport>, format: WireFormat, test_run_id: i64) -> Self {
        Self {
            shared: Arc::new(Shared {
                buffer: SampleBuffer::new(),
                transport,
                format,
                test_run_id,
            }),
            state: Mutex::new(State::Idle),
            stopped: watch::channel(false).0,
        }
    }

    /// Build an exporter posting to the configured collector over HTTP.
    pub fn from_settings(settings: &ExportSettings) -> ExportResult<Self> {
        let transport = HttpTransport::new(
            settings.endpoint.clone(),
            settings.org_id,
            settings.token.clone(),
            settings.auth,
            settings.upload_timeout,
        )?;
        Ok(Self::new(
            Arc::new(transport),
            settings.format,
            settings.test_run_id,
        ))
    }

    pub fn phase(&self) -> ExporterPhase {
        match *self.lock_state() {
            State::Idle => ExporterPhase::Idle,
            State::Running { .. } => ExporterPhase::Running,
            State::Stopping => ExporterPhase::Stopping,
            State::Stopped => ExporterPhase::Stopped,
        }
    }

    pub fn test_run_id(&self) -> i64 {
        self.shared.test_run_id
    }

    /// Number of trails waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Queue samples for export. Non-HTTP samples are discarded.
    ///
    /// Never waits on I/O.
    pub fn add_samples(&self, samples: impl IntoIterator<Item = Sample>) {
        if matches!(*self.lock_state(), State::Stopping | State::Stopped) {
            tracing::trace!("Exporter is stopping, discarding samples");
            return;
        }

        let accepted = self.shared.buffer.add(samples);
        if accepted > 0 {
            metrics::record_samples_buffered(accepted);
        }
    }

    /// Arm the flush timer. Must be called from within a Tokio runtime.
    pub fn start(&self, interval: Duration) -> ExportResult<()> {
        if interval.is_zero() {
            return Err(ExportError::InvalidInterval);
        }

        let mut state = self.lock_state();
        if !matches!(*state, State::Idle) {
            return Err(ExportError::AlreadyStarted);
        }

        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_flush_loop(
            self.shared.clone(),
            interval,
            shutdown.subscribe(),
        ));
        *state = State::Running { shutdown, task };

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            test_run_id = self.shared.test_run_id,
            "Exporter started"
        );
        Ok(())
    }

    /// Disarm the timer and wait for an in-flight flush to finish.
    ///
    /// Samples still buffered are discarded. A concurrent call waits for the
    /// first one to finish; calling `stop` on a stopped exporter does nothing.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.lock_state();
            match *state {
                State::Stopped => return,
                State::Stopping => Err(self.stopped.subscribe()),
                _ => Ok(mem::replace(&mut *state, State::Stopping)),
            }
        };

        let previous = match previous {
            Ok(previous) => previous,
            Err(mut stopped) => {
                // Another caller owns the transition
                let _ = stopped.wait_for(|done| *done).await;
                return;
            }
        };

        if let State::Running { shutdown, task } = previous {
            tracing::debug!("Stopping exporter");
            shutdown.trigger();
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Flush task ended abnormally");
            }
        }

        let discarded = self.shared.buffer.drain().len();
        *self.lock_state() = State::Stopped;
        self.stopped.send_replace(true);
        tracing::info!(discarded, "Exporter stopped");
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PeriodicExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicExporter")
            .field("phase", &self.phase())
            .field("test_run_id", &self.shared.test_run_id)
            .field("format", &self.shared.format)
            .finish_non_exhaustive()
    }
}

async fn run_flush_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    // A tick that lands during a slow upload is dropped, not queued
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::debug!("Flush task received shutdown signal, exiting loop");
                break;
            }
            _ = ticker.tick() => {
                shared.flush().await;
            }
        }
    }
}

impl Shared {
    async fn flush(&self) {
        let trails = self.buffer.drain();
        if trails.is_empty() {
            return;
        }

        let drained = trails.len();
        let records = self.project(trails);
        if records.is_empty() {
            tracing::debug!(drained, "No traced requests in this interval");
            return;
        }

        let count = records.len();
        let (batch, body) = match Batch::new(records).seal(self.format) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    records = count,
                    "Failed to serialize batch, dropping it"
                );
                metrics::record_batch_dropped(e.reason(), count);
                return;
            }
        };

        let size = body.len();
        let payload = Payload {
            body,
            content_type: self.format.content_type(),
        };

        match self.transport.send(payload).await {
            Ok(()) => {
                tracing::debug!(
                    records = batch.count,
                    size_bytes = batch.size_bytes,
                    "Exported batch"
                );
                metrics::record_batch_exported(count, size);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    records = count,
                    "Failed to export batch, dropping it"
                );
                metrics::record_batch_dropped(e.reason(), count);
            }
        }
    }

    /// Turn trails into records, skipping those without a trace id or with
    /// an unparseable status.
    fn project(&self, trails: Vec<HttpTrail>) -> Vec<TelemetryRecord> {
        let mut records = Vec::with_capacity(trails.len());

        for trail in trails {
            let Some(trace_id) = trail.trace_id() else {
                metrics::record_record_skipped("no_trace_id");
                continue;
            };

            let status = trail.tag(TAG_STATUS).unwrap_or_default();
            let http_status = match status.parse::<i64>() {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!(
                        status = %status,
                        error = %e,
                        "Unexpected status tag, skipping record"
                    );
                    metrics::record_record_skipped("invalid_status");
                    continue;
                }
            };

            let tag = |name: &str| trail.tag(name).unwrap_or_default().to_string();
            records.push(TelemetryRecord {
                test_run_id: self.test_run_id,
                start_time_unix_nano: unix_nanos(trail.start_time()),
                end_time_unix_nano: unix_nanos(trail.end_time),
                group: tag(TAG_GROUP),
                scenario: tag(TAG_SCENARIO),
                trace_id: trace_id.to_string(),
                http_url: tag(TAG_URL),
                http_method: tag(TAG_METHOD),
                http_status,
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sample::{MetricPoint, META_TRACE_ID};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::sync::{mpsc, Semaphore};

    const TRACE: &str = "dc0718c0a78e9bb52f736f6d65736f6d";

    /// Records every payload and answers from a script (Ok once exhausted).
    struct ScriptedTransport {
        sent: mpsc::UnboundedSender<Payload>,
        script: Mutex<VecDeque<ExportResult<()>>>,
        gate: Option<Arc<Semaphore>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<ExportResult<()>>) -> (Arc<Self>, mpsc::UnboundedReceiver<Payload>) {
            let (sent, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                sent,
                script: Mutex::new(script.into()),
                gate: None,
                calls: AtomicUsize::new(0),
            });
            (transport, rx)
        }

        fn gated(gate: Arc<Semaphore>) -> (Arc<Self>, mpsc::UnboundedReceiver<Payload>) {
            let (sent, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                sent,
                script: Mutex::new(VecDeque::new()),
                gate: Some(gate),
                calls: AtomicUsize::new(0),
            });
            (transport, rx)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, payload: Payload) -> ExportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.sent.send(payload);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn end_time() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_629_191_640)
    }

    fn traced(url: &str, status: &str) -> Sample {
        HttpTrail::new(end_time(), Duration::from_millis(250))
            .with_tag(TAG_URL, url)
            .with_tag(TAG_METHOD, "GET")
            .with_tag(TAG_STATUS, status)
            .with_tag(TAG_GROUP, "::checkout")
            .with_tag(TAG_SCENARIO, "default")
            .with_metadata(META_TRACE_ID, TRACE)
            .into()
    }

    fn untraced(url: &str) -> Sample {
        HttpTrail::new(end_time(), Duration::from_millis(10))
            .with_tag(TAG_URL, url)
            .with_tag(TAG_STATUS, "200")
            .into()
    }

    fn metric() -> Sample {
        MetricPoint {
            name: "iterations".into(),
            value: 1.0,
            time: end_time(),
            tags: BTreeMap::new(),
        }
        .into()
    }

    fn urls(payload: &Payload) -> Vec<String> {
        let batch = WireFormat::Protobuf.decode(&payload.body).unwrap();
        batch.records.into_iter().map(|r| r.http_url).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_exports_traced_records() {
        let (transport, mut rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport, WireFormat::Protobuf, 4242);

        exporter.add_samples(vec![
            traced("/a", "200"),
            untraced("/b"),
            traced("/c", "not-a-number"),
            metric(),
            traced("/d", "404"),
        ]);
        assert_eq!(exporter.buffered(), 4);

        exporter.start(Duration::from_secs(1)).unwrap();
        let payload = rx.recv().await.unwrap();
        assert_eq!(payload.content_type, "application/x-protobuf");

        let batch = WireFormat::Protobuf.decode(&payload.body).unwrap();
        assert_eq!(batch.count, 2);
        assert!(batch.size_bytes > 0);

        let first = &batch.records[0];
        assert_eq!(first.http_url, "/a");
        assert_eq!(first.http_method, "GET");
        assert_eq!(first.http_status, 200);
        assert_eq!(first.group, "::checkout");
        assert_eq!(first.scenario, "default");
        assert_eq!(first.trace_id, TRACE);
        assert_eq!(first.test_run_id, 4242);
        assert_eq!(first.end_time_unix_nano, 1_629_191_640_000_000_000);
        assert_eq!(first.start_time_unix_nano, 1_629_191_639_750_000_000);
        assert_eq!(batch.records[1].http_status, 404);

        assert_eq!(exporter.buffered(), 0);
        exporter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_block_next() {
        let (transport, mut rx) =
            ScriptedTransport::new(vec![Err(ExportError::Transport("connection reset".into()))]);
        let exporter = PeriodicExporter::new(transport.clone(), WireFormat::Protobuf, 1);

        exporter.add_samples(vec![traced("/first", "200")]);
        exporter.start(Duration::from_secs(1)).unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(urls(&failed), vec!["/first"]);

        exporter.add_samples(vec![traced("/second", "200")]);
        assert_eq!(exporter.buffered(), 1);

        // The failed batch is not replayed
        let next = rx.recv().await.unwrap();
        assert_eq!(urls(&next), vec!["/second"]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        exporter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_interval_skips_upload() {
        let (transport, _rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport.clone(), WireFormat::Protobuf, 1);

        exporter.add_samples(vec![untraced("/b"), metric()]);
        exporter.start(Duration::from_secs(1)).unwrap();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(exporter.buffered(), 0);
        exporter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_inflight_flush() {
        let gate = Arc::new(Semaphore::new(0));
        let (transport, mut rx) = ScriptedTransport::gated(gate.clone());
        let exporter = Arc::new(PeriodicExporter::new(
            transport.clone(),
            WireFormat::Protobuf,
            1,
        ));

        exporter.add_samples(vec![traced("/slow", "200")]);
        exporter.start(Duration::from_secs(1)).unwrap();
        rx.recv().await.unwrap();

        let spawn_stop = || {
            let exporter = exporter.clone();
            tokio::spawn(async move { exporter.stop().await })
        };
        let first = spawn_stop();
        time::sleep(Duration::from_secs(1)).await;
        let second = spawn_stop();

        time::sleep(Duration::from_secs(5)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());
        assert_eq!(exporter.phase(), ExporterPhase::Stopping);

        // Samples arriving while stopping are dropped
        exporter.add_samples(vec![traced("/during", "200")]);
        assert_eq!(exporter.buffered(), 0);

        gate.add_permits(1);
        second.await.unwrap();
        assert_eq!(exporter.phase(), ExporterPhase::Stopped);
        first.await.unwrap();

        // Timer is disarmed and nothing accumulates
        exporter.add_samples(vec![traced("/late", "200")]);
        assert_eq!(exporter.buffered(), 0);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_discards_buffered_samples() {
        let (transport, _rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport.clone(), WireFormat::Protobuf, 1);

        exporter.start(Duration::from_secs(60)).unwrap();
        exporter.add_samples(vec![traced("/a", "200"), traced("/b", "200")]);
        assert_eq!(exporter.buffered(), 2);

        exporter.stop().await;
        assert_eq!(exporter.buffered(), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    /// Takes `delay` to answer every upload.
    struct SlowTransport {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(&self, _payload: Payload) -> ExportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_during_slow_upload_are_skipped() {
        let transport = Arc::new(SlowTransport {
            delay: Duration::from_millis(3_500),
            calls: AtomicUsize::new(0),
        });
        let exporter = PeriodicExporter::new(transport.clone(), WireFormat::Protobuf, 1);
        exporter.start(Duration::from_secs(1)).unwrap();

        // Upload at t=1s runs until t=4.5s; ticks at 2s, 3s and 4s are
        // dropped and the next upload starts at t=5s.
        for _ in 0..51 {
            exporter.add_samples(vec![traced("/busy", "200")]);
            time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        exporter.stop().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (transport, _rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport, WireFormat::Json, 1);
        assert_eq!(exporter.phase(), ExporterPhase::Idle);

        exporter.start(Duration::from_secs(60)).unwrap();
        assert_eq!(exporter.phase(), ExporterPhase::Running);
        assert_eq!(
            exporter.start(Duration::from_secs(60)),
            Err(ExportError::AlreadyStarted)
        );

        exporter.stop().await;
        assert_eq!(exporter.phase(), ExporterPhase::Stopped);
        assert_eq!(
            exporter.start(Duration::from_secs(60)),
            Err(ExportError::AlreadyStarted)
        );

        // Idempotent
        exporter.stop().await;
        assert_eq!(exporter.phase(), ExporterPhase::Stopped);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (transport, _rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport, WireFormat::Protobuf, 1);
        assert_eq!(exporter.start(Duration::ZERO), Err(ExportError::InvalidInterval));
        assert_eq!(exporter.phase(), ExporterPhase::Idle);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let (transport, _rx) = ScriptedTransport::new(vec![]);
        let exporter = PeriodicExporter::new(transport, WireFormat::Protobuf, 1);
        exporter.stop().await;
        assert_eq!(exporter.phase(), ExporterPhase::Stopped);
    }
}
