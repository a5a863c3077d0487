use anyhow::Context;
use rl_live::{AnalysisTransport, ConsoleConfig, RiskConsole};
use rl_telemetry::EventSink;
use rl_types::{AnalyzerInputs, TelemetryRecord};
use std::future::Future;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConsoleConfig::from_env().context("invalid console configuration")?;
    info!(
        analyze = %config.analyze_url()?,
        stream = %config.stream_url()?,
        "RiskLens console starting"
    );

    let console = RiskConsole::from_config(config, EventSink::disabled())?;
    run_session(console, AnalyzerInputs::default(), interrupted()).await
}

/// Resolves on Ctrl-C. If the handler cannot be installed the session runs
/// until killed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Run one analysis, then follow the live feed until `shutdown` resolves.
/// The session is torn down on every exit path, including a shutdown that
/// arrives while the analysis is still outstanding.
async fn run_session<A, F>(
    console: RiskConsole<A>,
    inputs: AnalyzerInputs,
    shutdown: F,
) -> anyhow::Result<()>
where
    A: AnalysisTransport + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    info!(
        wallet = %inputs.wallet,
        token = %inputs.token,
        amount = %inputs.amount,
        network = %inputs.network,
        "analyzing default transaction"
    );
    let stopped = tokio::select! {
        _ = &mut shutdown => {
            info!("interrupted before the analysis completed");
            true
        }
        result = console.analyze_inputs(&inputs) => {
            info!(
                verdict = %result.badge(),
                explanation = %result.explanation,
                confidence = result.confidence,
                "analysis result"
            );
            false
        }
    };

    if !stopped {
        let mut telemetry = console.subscribe_telemetry();
        let mut connection = console.connection();
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                state = connection.changed() => match state {
                    Some(state) => info!(status = state.indicator_label(), "live feed status"),
                    None => break,
                },
                changed = telemetry.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let rows = telemetry.borrow_and_update().clone();
                    log_rows(&rows);
                }
            }
        }
    }

    console.shutdown().await?;
    Ok(())
}

fn log_rows(rows: &[TelemetryRecord]) {
    info!(rows = rows.len(), "live threat stream updated");
    for row in rows {
        info!(
            id = %row.id,
            asset = %row.asset,
            amount = %format!("${}", row.amount),
            level = %row.level,
            time = %row.time,
            "  row"
        );
    }
}
