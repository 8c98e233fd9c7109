use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

/// Registers descriptions for metrics owned by this binary, then delegates
/// to the scheduler crate for its own. A library should not register global
/// metric metadata on behalf of its embedder more than once, so this call
/// lives here rather than inside `scheduler`.
pub(crate) fn install_metrics() {
    describe_gauge!(
        "flowschedd.build_info",
        Unit::Count,
        "Constant 1-valued gauge carrying the running binary's version as a label"
    );
    describe_counter!(
        "flowschedd.shutdown_total",
        Unit::Count,
        "Number of times this process has run its shutdown sequence"
    );

    scheduler::describe_metrics();
}

/// Sets the constant build-info gauge once at startup.
pub(crate) fn record_build_info() {
    gauge!("flowschedd.build_info", 1.0, "version" => env!("CARGO_PKG_VERSION"));
}

/// Records one pass through the shutdown sequence.
pub(crate) fn record_shutdown() {
    counter!("flowschedd.shutdown_total", 1);
}
