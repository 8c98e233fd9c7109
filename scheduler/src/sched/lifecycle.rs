//! Start, close, and the watchdog (spec section 4.K). Starting spawns the
//! tick driver plus a watchdog that treats the driver's unrequested
//! termination as fatal to the process; closing asks the driver to stop
//! after its current tick without cancelling in-flight evaluations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info};

use super::Scheduler;
use lib::shutdown::Shutdown;

pub(super) struct DriverHandle {
    shutdown: Shutdown,
    close_requested: Arc<AtomicBool>,
    done: oneshot::Receiver<()>,
}

impl Scheduler {
    /// Starts the tick driver and its watchdog. Calling `start()` again
    /// before `close()` is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.driver_handle.lock().await;
        if handle.is_some() {
            info!("scheduler already started");
            return;
        }

        let shutdown = Shutdown::default();
        let close_requested = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();

        let driver_scheduler = Arc::clone(self);
        let mut driver_shutdown = shutdown.clone();
        let join = tokio::spawn(async move {
            driver_scheduler.run_driver(&mut driver_shutdown).await;
        });

        let watchdog_scheduler = Arc::clone(self);
        let watchdog_close_requested = Arc::clone(&close_requested);
        tokio::spawn(async move {
            let outcome = join.await;
            let _ = done_tx.send(());
            if !watchdog_close_requested.load(Ordering::SeqCst) {
                error!(?outcome, "tick driver terminated without a close request");
                (watchdog_scheduler.fatal_handler)();
            }
        });

        *handle = Some(DriverHandle {
            shutdown,
            close_requested,
            done: done_rx,
        });
    }

    /// Signals the driver to stop after its current tick and waits for it to
    /// do so. In-flight evaluations are not cancelled.
    pub async fn close(&self) {
        let taken = {
            let mut guard = self.driver_handle.lock().await;
            guard.take()
        };
        let Some(handle) = taken else {
            info!("scheduler already closed");
            return;
        };

        handle.close_requested.store(true, Ordering::SeqCst);
        let mut shutdown = handle.shutdown;
        shutdown.broadcast_shutdown();
        let _ = handle.done.await;
    }
}
