use crate::types::ControllerReport;
use crate::{Result, RiftSError};
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

/// Receives every controller report the session decodes.
pub trait ControllerSink: Send {
    fn handle(&mut self, report: ControllerReport);
}

/// Create a bounded channel pair for controller reports.
///
/// The sink side is given to a session; reports that find the channel full
/// are dropped rather than stalling the poll loop. A zero capacity is
/// raised to 1.
pub fn controller_channel(capacity: usize) -> (ChannelSink, ControllerStream) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
    (ChannelSink { sender }, ControllerStream { receiver })
}

/// [`ControllerSink`] that forwards into a [`ControllerStream`].
pub struct ChannelSink {
    sender: Sender<ControllerReport>,
}

impl ControllerSink for ChannelSink {
    fn handle(&mut self, report: ControllerReport) {
        if let Err(e) = self.sender.try_send(report) {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    log::trace!("Controller channel full, dropping report");
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    log::trace!("Controller stream dropped, discarding report");
                }
            }
        }
    }
}

/// Receiving end of [`controller_channel`].
pub struct ControllerStream {
    receiver: Receiver<ControllerReport>,
}

impl ControllerStream {
    /// Receive the next report (blocks until available).
    pub fn recv(&self) -> Result<ControllerReport> {
        self.receiver
            .recv()
            .map_err(|_| RiftSError::StreamStopped)
    }

    /// Try to receive a report without blocking.
    pub fn try_recv(&self) -> Option<ControllerReport> {
        self.receiver.try_recv().ok()
    }

    /// Receive a report with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ControllerReport> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => RiftSError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => RiftSError::StreamStopped,
        })
    }
}
