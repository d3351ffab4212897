//! Process signals mapped to ticker control requests.
//!
//! On Unix: SIGINT/SIGTERM shut down, SIGHUP reloads the config file,
//! SIGUSR1/SIGUSR2 suspend and resume. Elsewhere only Ctrl+C is handled.

use anyhow::Result;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Shutdown,
    Reload,
    Suspend,
    Resume,
}

#[cfg(unix)]
pub struct Signals {
    terminate: Signal,
    interrupt: Signal,
    hangup: Signal,
    suspend: Signal,
    resume: Signal,
}

#[cfg(unix)]
impl Signals {
    pub fn new() -> Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
            suspend: signal(SignalKind::user_defined1())?,
            resume: signal(SignalKind::user_defined2())?,
        })
    }

    pub async fn recv(&mut self) -> Control {
        tokio::select! {
            biased;

            _ = self.terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                Control::Shutdown
            }
            _ = self.interrupt.recv() => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                Control::Shutdown
            }
            _ = self.hangup.recv() => Control::Reload,
            _ = self.suspend.recv() => Control::Suspend,
            _ = self.resume.recv() => Control::Resume,
        }
    }
}

#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> Control {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down gracefully");
        Control::Shutdown
    }
}
