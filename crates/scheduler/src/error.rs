/// Errors from the cooperative event loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Hardware(#[from] hw_scheduler::SchedulerError),
    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[from] std::io::Error),
}
