//! Help viewer hook for `/help`.
//!
//! The relay has no help content of its own. `/help` just tells whatever
//! [`HelpViewer`] the server was built with that someone asked; nothing is
//! sent back to the client.

/// Out-of-band help presentation.
pub trait HelpViewer: Send + Sync + 'static {
    /// Called once per `/help`. `requester` is the caller's display name,
    /// or its origin address if it has not connected yet. Must not block.
    fn show(&self, requester: &str);
}

/// Records help requests in the server log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHelpViewer;

impl HelpViewer for TracingHelpViewer {
    fn show(&self, requester: &str) {
        tracing::info!(%requester, "help requested");
    }
}
