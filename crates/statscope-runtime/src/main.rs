//! statscope demo
//!
//! Loads a scope config, records a burst of metrics from a few tasks,
//! closes the root (final flush), and prints the rendered sink plus a
//! JSON snapshot of a parallel test scope.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use statscope_core::{Buckets, CachedStatsReporter, StatsReporter};
use statscope_runtime::{config, Scope, TextReporter};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "statscope.yaml".to_owned());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let sink = Arc::new(TextReporter::new());
    let opts = cfg
        .scope
        .to_options()
        .expect("scope options")
        .with_reporter(Arc::clone(&sink) as Arc<dyn StatsReporter>)
        .with_cached_reporter(Arc::clone(&sink) as Arc<dyn CachedStatsReporter>);
    let root = Scope::new_root(opts, cfg.scope.reporting_interval()).expect("root scope");
    let shadow = Scope::new_test(root.prefix(), root.tags().iter());

    tracing::info!(prefix = %root.prefix(), "statscope-demo starting");

    let mut tasks = Vec::new();
    for worker in 0..4u32 {
        let scope = root.tagged([("worker", worker.to_string())]);
        let shadow = shadow.tagged([("worker", worker.to_string())]);
        tasks.push(tokio::spawn(async move {
            let payload = Buckets::linear_values(0.0, 10.0, 5).expect("payload buckets");
            for i in 0..25u32 {
                for s in [&scope, &shadow] {
                    s.counter("requests").inc(1);
                    s.gauge("inflight").update(f64::from(i % 5));
                    s.histogram("payload_kb", Some(&payload)).record_value(f64::from(i));
                    let timer = s.timer("handle");
                    let sw = timer.start();
                    sw.stop();
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }));
    }
    for t in tasks {
        t.await.expect("worker task panicked");
    }

    if let Err(e) = root.close() {
        tracing::warn!(error = %e, "root close reported an error");
    }

    println!("{}", sink.render());
    let snap = serde_json::to_string_pretty(&shadow.snapshot()).expect("snapshot json");
    println!("{snap}");
    tracing::info!(flushes = sink.flush_count(), "statscope-demo done");
}
