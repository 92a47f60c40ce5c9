//! Error types.
//!
//! Two layers:
//!
//! - `DriverError` / `MaterialError`: the typed taxonomy produced by the
//!   library (leg validation, Newton failures, material inadmissibility,
//!   output failures)
//! - `AppError`: what the `mps` binary reports, carrying a process exit code

use thiserror::Error;

/// A single problem found while validating one leg of a path.
#[derive(Debug, Clone, PartialEq)]
pub struct LegError {
    /// 1-based leg number (0 when the error is not tied to one leg).
    pub leg: usize,
    pub message: String,
}

impl LegError {
    pub fn new(leg: usize, message: impl Into<String>) -> Self {
        Self {
            leg,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.leg == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "leg {}: {}", self.leg, self.message)
        }
    }
}

/// Errors raised by a constitutive kernel.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaterialError {
    /// The requested update leads to a state the model cannot represent.
    #[error("inadmissible material state: {0}")]
    Inadmissible(String),

    /// The kernel produced NaN/inf output.
    #[error("material returned non-finite {0}")]
    NonFinite(&'static str),

    /// Bad or missing model parameter.
    #[error("invalid material parameter: {0}")]
    Parameter(String),

    /// Unknown model name.
    #[error("{0}: unknown material model")]
    UnknownModel(String),
}

impl MaterialError {
    pub fn inadmissible(details: impl Into<String>) -> Self {
        Self::Inadmissible(details.into())
    }

    pub fn parameter(details: impl Into<String>) -> Self {
        Self::Parameter(details.into())
    }
}

/// Errors raised while validating or integrating a path.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Malformed or inadmissible leg data; integration never starts.
    #[error("{} input error(s):\n{}", .0.len(), join_leg_errors(.0))]
    InputValidation(Vec<LegError>),

    /// Newton iteration exhausted its budget on one (sub-)step.
    #[error("newton iteration failed to converge in {iterations} iterations (residual {residual:.3e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// The material rejected the trial state.
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// A local failure that survived every allowed cutback.
    #[error("integration failed in leg {leg}, step {step} after {cutbacks} cutback(s): {source}")]
    IntegrationFailure {
        leg: usize,
        step: usize,
        cutbacks: usize,
        #[source]
        source: Box<DriverError>,
    },

    /// Output sink failure; the path is aborted.
    #[error("output error: {0}")]
    Io(String),
}

impl DriverError {
    pub fn invalid(leg: usize, message: impl Into<String>) -> Self {
        Self::InputValidation(vec![LegError::new(leg, message)])
    }

    /// True for failures that a cutback may recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConvergenceFailure { .. } | Self::Material(_))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<csv::Error> for DriverError {
    fn from(e: csv::Error) -> Self {
        Self::Io(e.to_string())
    }
}

fn join_leg_errors(errors: &[LegError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
    lines.join("\n")
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<DriverError> for AppError {
    fn from(e: DriverError) -> Self {
        let code = match &e {
            DriverError::InputValidation(_) | DriverError::Io(_) => 2,
            DriverError::Material(MaterialError::Parameter(_) | MaterialError::UnknownModel(_)) => 2,
            _ => 4,
        };
        AppError::new(code, e.to_string())
    }
}

impl From<MaterialError> for AppError {
    fn from(e: MaterialError) -> Self {
        DriverError::from(e).into()
    }
}
