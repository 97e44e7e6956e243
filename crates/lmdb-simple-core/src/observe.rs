//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, façade operations emit counters,
//! histograms, and gauges via the [`metrics`] crate. A downstream
//! application must install a metrics recorder to collect the data.
//!
//! Without the feature every function in this module is a no-op.

/// Record one façade operation (counter + latency histogram).
///
/// - `lmdb_simple.operations_total` – counter with `op` and `outcome` labels
/// - `lmdb_simple.operation_duration_seconds` – histogram with `op` label
#[inline]
pub fn record_operation(op: &'static str, duration: std::time::Duration, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("lmdb_simple.operations_total", "op" => op, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("lmdb_simple.operation_duration_seconds", "op" => op)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (op, duration, success);
    }
}

/// Record an environment being opened by the engine.
///
/// - `lmdb_simple.env_opens_total` – counter with `mode` label (`writer` / `reader`)
#[inline]
pub fn record_env_open(writer: bool) {
    #[cfg(feature = "observe")]
    {
        let mode = if writer { "writer" } else { "reader" };
        metrics::counter!("lmdb_simple.env_opens_total", "mode" => mode).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = writer;
    }
}

/// Set the number of environments currently open in this process.
///
/// - `lmdb_simple.open_environments` – gauge
#[inline]
pub fn set_open_environments(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("lmdb_simple.open_environments").set(count as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}
