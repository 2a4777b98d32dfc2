use crate::workflow::config::LoggerConfig;
use anyhow::Context;
use log::{info, warn};
use radarcore::clock::{Clock, SystemClock};
use radarcore::host_interface::{ConnectOptions, SimulationHost, RECORD_HEADER};
use radarcore::prelude::{HostResult, SessionResult};
use radarcore::sink::{CsvSink, RecordSink};
use radarcore::{Session, SessionSummary, TickOutcome};
use std::fs::{self, OpenOptions};
use std::future::{self, Future};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Drives one logging session from sink creation to the final report.
#[derive(Clone)]
pub struct Runner {
    config: LoggerConfig,
}

impl Runner {
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }

    pub fn report_path(&self) -> PathBuf {
        let session = &self.config.session;
        session
            .output_dir
            .join(format!("{}_sessions.log", session.label))
    }

    /// Opens the output, connects through `connect`, runs until the runtime
    /// is used up, the operator interrupts, or the host fails.
    pub async fn execute<H, F>(&self, connect: F) -> anyhow::Result<SessionSummary>
    where
        H: SimulationHost,
        F: FnOnce(&ConnectOptions) -> HostResult<H>,
    {
        self.execute_with_clock(connect, SystemClock, tokio::signal::ctrl_c())
            .await
    }

    pub async fn execute_with_clock<H, F, C, I>(
        &self,
        connect: F,
        clock: C,
        interrupt: I,
    ) -> anyhow::Result<SessionSummary>
    where
        H: SimulationHost,
        F: FnOnce(&ConnectOptions) -> HostResult<H>,
        C: Clock,
        I: Future,
    {
        // Armed before any host resource is acquired.
        let mut interrupt = Interrupt::arm(interrupt).await;

        let session_config = self.config.to_session_config();
        let output_path = session_config.output_path();
        let sink = CsvSink::create(&output_path)
            .with_context(|| format!("creating output file {}", output_path.display()))?;
        info!("[SETUP] CSV file created at {}", output_path.display());

        let options = &self.config.connection;
        info!("[SETUP] Connecting to {}:{}...", options.host, options.port);
        let host = connect(options)
            .with_context(|| format!("connecting to {}:{}", options.host, options.port))?;

        let tick_interval = Duration::from_millis(session_config.tick_interval_ms.max(1));
        let mut session = Session::new(session_config, host, sink, clock)
            .context("building logging session")?;

        let outcome = drive(&mut session, tick_interval, &mut interrupt).await;
        if let Err(err) = &outcome {
            session.fail(err);
        }
        let summary = session.finish();

        verify_output(&output_path);
        self.append_report(&summary)?;
        outcome.context("logging session aborted")?;
        Ok(summary)
    }

    fn append_report(&self, summary: &SessionSummary) -> anyhow::Result<()> {
        let report_path = self.report_path();
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&report_path)
            .with_context(|| format!("opening session report {}", report_path.display()))?;
        let line = serde_json::to_string(summary).context("encoding session summary")?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Operator interrupt signal. Polling it once registers the underlying
/// handler, after which a signal is held until the next check.
struct Interrupt<I: Future> {
    signal: Pin<Box<I>>,
    fired: bool,
}

impl<I: Future> Interrupt<I> {
    async fn arm(signal: I) -> Self {
        let mut interrupt = Self {
            signal: Box::pin(signal),
            fired: false,
        };
        interrupt.check().await;
        interrupt
    }

    async fn check(&mut self) -> bool {
        if !self.fired {
            let signal = &mut self.signal;
            self.fired =
                future::poll_fn(|cx| Poll::Ready(signal.as_mut().poll(cx).is_ready())).await;
        }
        self.fired
    }

    async fn wait(&mut self) {
        if !self.fired {
            self.signal.as_mut().await;
            self.fired = true;
        }
    }
}

async fn drive<H, S, C, I>(
    session: &mut Session<H, S, C>,
    tick_interval: Duration,
    interrupt: &mut Interrupt<I>,
) -> SessionResult<()>
where
    H: SimulationHost,
    S: RecordSink,
    C: Clock,
    I: Future,
{
    if !interrupt.check().await {
        session.prepare()?;
    }
    if interrupt.check().await {
        session.interrupt();
        return Ok(());
    }
    info!("[SETUP] Entering main loop");

    let mut ticker = time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interrupt.wait() => {
                session.interrupt();
                return Ok(());
            }
            _ = ticker.tick() => {
                if session.tick()? == TickOutcome::Finished {
                    return Ok(());
                }
            }
        }
    }
}

fn verify_output(path: &Path) {
    let header_len = RECORD_HEADER.join(",").len() as u64 + 1;
    match fs::metadata(path) {
        Ok(meta) if meta.len() > header_len => info!(
            "[DONE] Data saved to {} ({} bytes)",
            path.display(),
            meta.len()
        ),
        Ok(_) => warn!(
            "[WARNING] Output file {} exists but contains only the header",
            path.display()
        ),
        Err(err) => warn!(
            "[ERROR] Output file was not created at {}: {}",
            path.display(),
            err
        ),
    }
}
