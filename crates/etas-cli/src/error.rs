//! Error types for the `etas-simulate` binary.

/// Top-level error of the command-line driver.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Loading, preparing or running the simulation failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: etas_core::SimulationError,
    },

    /// Neither `--output` nor `fn_store` names a destination.
    #[error("no output path: pass --output or set fn_store in the parameter file")]
    MissingOutput,

    /// Two flags contradict each other.
    #[error("invalid arguments: {reason}")]
    Arguments {
        /// What is wrong with the arguments.
        reason: String,
    },
}
