//! Interrupt handling for the capture commands

use tokio::sync::mpsc;
use tracing::debug;

/// Signals the recording loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSignal {
    /// Ctrl+C; the first one stops gracefully, a second one aborts
    Interrupt,
    /// SIGTERM; stop and save
    Terminate,
}

/// Delivers every Ctrl+C and SIGTERM, not just the first
pub struct ShutdownSignal {
    receiver: mpsc::Receiver<CaptureSignal>,
}

impl ShutdownSignal {
    /// Start listening. Must be called inside a tokio runtime.
    pub fn listen() -> Result<Self, std::io::Error> {
        let (tx, rx) = mpsc::channel(8);

        let tx_int = tx.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received SIGINT");
                if tx_int.send(CaptureSignal::Interrupt).await.is_err() {
                    break;
                }
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                while sigterm.recv().await.is_some() {
                    debug!("Received SIGTERM");
                    if tx.send(CaptureSignal::Terminate).await.is_err() {
                        break;
                    }
                }
            });
        }
        #[cfg(not(unix))]
        drop(tx);

        Ok(Self { receiver: rx })
    }

    /// Build from an existing channel, for driving the loop without real signals
    pub fn from_channel(receiver: mpsc::Receiver<CaptureSignal>) -> Self {
        Self { receiver }
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<CaptureSignal> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_signals_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut signals = ShutdownSignal::from_channel(rx);
        tx.send(CaptureSignal::Interrupt).await.unwrap();
        tx.send(CaptureSignal::Terminate).await.unwrap();
        drop(tx);

        assert_eq!(signals.recv().await, Some(CaptureSignal::Interrupt));
        assert_eq!(signals.recv().await, Some(CaptureSignal::Terminate));
        assert_eq!(signals.recv().await, None);
    }

    #[tokio::test]
    async fn listen_installs_handlers() {
        assert!(ShutdownSignal::listen().is_ok());
    }
}
