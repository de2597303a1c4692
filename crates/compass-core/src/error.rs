use thiserror::Error;

/// Error taxonomy shared across the investigation core.
///
/// Kinds, not concrete transports: `Transport` wraps whatever a backend
/// implementation wants to report (a timeout, a 5xx, a connection reset);
/// the core only needs to know it was recoverable at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Adding `cost` would push `total_cost` past `budget_limit`. Fatal to
    /// the investigation; the total is left unmutated.
    #[error(
        "investigation {investigation_id} would exceed budget: ${new_total:.2} > ${budget_limit:.2} (overrun ${overrun:.2})"
    )]
    BudgetExceeded {
        investigation_id: String,
        new_total: f64,
        budget_limit: f64,
        overrun: f64,
    },

    /// `transition_to(target)` was called from a status with no edge to
    /// `target` in the transition table. The investigation is unmutated.
    #[error("cannot transition from {from} to {to}; valid transitions: {valid:?}")]
    InvalidTransition {
        from: String,
        to: String,
        valid: Vec<String>,
    },

    /// A backend (metric/log/trace/LLM) call failed in a way local to the
    /// call site. Recoverable: the caller records it and continues.
    #[error("transport error talking to {backend}: {message}")]
    Transport { backend: String, message: String },

    /// A caller-visible precondition was violated (empty prompt, empty
    /// ranked list, malformed query). Always raised, never swallowed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation was aborted via a cancellation signal. Always
    /// recoverable; the caller aborts the current phase only.
    #[error("operation cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;
