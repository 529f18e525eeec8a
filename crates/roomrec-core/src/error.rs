use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Recorder driver error: {0}")]
    Driver(#[from] roomrec_driver::DriverError),

    #[error("Log tail error: {0}")]
    Tail(#[from] roomrec_tail::TailError),

    #[error("Monitor is already running")]
    AlreadyRunning,
}
