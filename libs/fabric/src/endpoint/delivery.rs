use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_core::ChannelId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::endpoint::Callback;
use crate::error::{Error, Result};

/// Where a receiver pulls its next item from
#[async_trait::async_trait]
pub(crate) trait Inbound<T>: Send + Sync + 'static {
    /// Wait for the next item; must be cancel-safe
    async fn next(&self) -> Result<T>;
}

/// Who owns delivery right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Pull,
    Callback,
    Closed,
}

impl Mode {
    /// Whether a pull read may take items in this mode
    fn check_pull(self) -> Result<()> {
        match self {
            Mode::Pull => Ok(()),
            Mode::Callback => Err(Error::CallbackModeActive),
            Mode::Closed => Err(Error::ConnectionClosed),
        }
    }
}

struct DeliveryLoop {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Pull/push delivery state of one receiver
///
/// In pull mode `receive`/`try_receive` read straight from the inbound
/// source. `add_callback` moves the receiver to push mode by spawning one
/// task that owns delivery until `stop` joins it. Pull reads already waiting
/// when the mode changes give up with the matching error instead of taking
/// the next item.
pub(crate) struct Delivery<T> {
    channel: ChannelId,
    source: Arc<dyn Inbound<T>>,
    poll_interval: Duration,
    mode: watch::Sender<Mode>,
    active: Mutex<Option<DeliveryLoop>>,
}

impl<T: Send + 'static> Delivery<T> {
    pub(crate) fn new(
        channel: ChannelId,
        source: Arc<dyn Inbound<T>>,
        poll_interval: Duration,
    ) -> Self {
        let (mode, _) = watch::channel(Mode::Pull);
        Self {
            channel,
            source,
            poll_interval,
            mode,
            active: Mutex::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    pub(crate) async fn receive(&self) -> Result<T> {
        let mut mode = self.mode.subscribe();

        loop {
            mode.borrow_and_update().check_pull()?;

            tokio::select! {
                biased;

                changed = mode.changed() => {
                    if changed.is_err() {
                        return Err(Error::ConnectionClosed);
                    }
                }
                item = self.source.next() => return item,
            }
        }
    }

    pub(crate) async fn try_receive(&self, timeout: Duration) -> Result<Option<T>> {
        match tokio::time::timeout(timeout, self.receive()).await {
            Ok(item) => item.map(Some),
            Err(_) => Ok(None),
        }
    }

    pub(crate) fn start(&self, callback: Callback<T>) -> Result<()> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::CallbackAlreadyRegistered);
        }
        let closed = *self.mode.borrow() == Mode::Closed;
        if closed {
            return Err(Error::ConnectionClosed);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Custom(format!("Callback delivery needs a tokio runtime: {}", e)))?;

        // Flip the mode first so waiting pull reads let go of the source
        self.mode.send_replace(Mode::Callback);

        let (stop, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(run_loop(
            self.channel.clone(),
            Arc::clone(&self.source),
            callback,
            stop_rx,
            self.poll_interval,
        ));

        *active = Some(DeliveryLoop { stop, handle });
        Ok(())
    }

    pub(crate) async fn stop(&self) -> Result<()> {
        // Lock is released before awaiting the join
        let delivery = self.active.lock().take().ok_or(Error::NoActiveCallback)?;

        let _ = delivery.stop.send(true);
        if let Err(e) = delivery.handle.await {
            warn!(channel = %self.channel, error = %e, "Delivery loop ended abnormally");
        }

        // Back to pull mode unless closed or a new callback took over meanwhile
        {
            let active = self.active.lock();
            if active.is_none() {
                self.mode.send_if_modified(|mode| {
                    if *mode == Mode::Callback {
                        *mode = Mode::Pull;
                        true
                    } else {
                        false
                    }
                });
            }
        }
        Ok(())
    }

    /// Stop delivery for good: the loop is joined and every pending or later
    /// read fails with [`Error::ConnectionClosed`]
    pub(crate) async fn close(&self) {
        self.mode.send_replace(Mode::Closed);
        let _ = self.stop().await;
    }
}

impl<T> Drop for Delivery<T> {
    fn drop(&mut self) {
        if let Some(delivery) = self.active.get_mut().take() {
            delivery.handle.abort();
        }
    }
}

async fn run_loop<T: Send + 'static>(
    channel: ChannelId,
    source: Arc<dyn Inbound<T>>,
    callback: Callback<T>,
    mut stop: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    debug!(channel = %channel, "Delivery loop started");
    let mut delivered: u64 = 0;

    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            item = tokio::time::timeout(poll_interval, source.next()) => match item {
                Ok(Ok(value)) => {
                    callback(value);
                    delivered += 1;
                }
                Ok(Err(Error::ConnectionClosed)) => break,
                Ok(Err(e)) => warn!(channel = %channel, error = %e, "Dropping undeliverable item"),
                Err(_) => trace!(channel = %channel, "Delivery loop idle"),
            },
        }
    }

    debug!(channel = %channel, delivered, "Delivery loop stopped");
}
