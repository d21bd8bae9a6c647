use tracing::{info, warn};

/// SIGTERM (pod termination) and ctrl-c listener.
///
/// Call [`ShutdownSignal::register`] before starting the feed.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves once a signal arrives. If ctrl-c cannot be watched, keeps
    /// waiting for SIGTERM.
    #[cfg(unix)]
    pub async fn wait(mut self) -> std::io::Result<()> {
        tokio::select! {
            _ = self.sigterm.recv() => info!("SIGTERM received"),
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => info!("ctrl-c received"),
                Err(e) => {
                    warn!(error = %e, "Failed to listen for ctrl-c, waiting for SIGTERM");
                    self.sigterm.recv().await;
                    info!("SIGTERM received");
                }
            },
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn wait(self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("ctrl-c received");
        Ok(())
    }
}
