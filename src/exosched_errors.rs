use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExoschedError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Scheduling window is over-defined: give either an end date or a window length, not both")]
    OverdefinedWindow,

    #[error("Scheduling window is under-defined: an end date or a window length is required")]
    UnderdefinedWindow,

    #[error("Scheduling window ends ({end}) before it starts ({start})")]
    WindowEndsBeforeStart { start: f64, end: f64 },

    #[error("Unknown telescope: {0}")]
    UnknownTelescope(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Duplicate telescope identifier: {0}")]
    DuplicateTelescope(String),

    #[error("Telescope registry is full ({0} instruments)")]
    TooManyTelescopes(usize),

    #[error("Invalid catalog row for {name}: {reason}")]
    InvalidCatalogRow { name: String, reason: String },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("NaN encountered in a coordinate")]
    NanCoordinate,

    #[error("Gaussian noise generation failed: {0:?}")]
    NoiseInjectionError(rand_distr::NormalError),

    #[error("Period fit failed: {0}")]
    PeriodFit(#[from] PeriodFitError),
}

/// Reasons why a weighted linear ephemeris fit could not be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeriodFitError {
    #[error("not enough timing measurements ({found} < {required})")]
    TooFewPoints { found: usize, required: usize },

    #[error("normal equations are singular")]
    SingularSystem,

    #[error("malformed timing measurement at index {0}")]
    MalformedPoint(usize),
}

impl From<rand_distr::NormalError> for ExoschedError {
    fn from(err: rand_distr::NormalError) -> Self {
        ExoschedError::NoiseInjectionError(err)
    }
}

impl From<ordered_float::FloatIsNan> for ExoschedError {
    fn from(_: ordered_float::FloatIsNan) -> Self {
        ExoschedError::NanCoordinate
    }
}

impl PartialEq for ExoschedError {
    fn eq(&self, other: &Self) -> bool {
        use ExoschedError::*;
        match (self, other) {
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (OverdefinedWindow, OverdefinedWindow) => true,
            (UnderdefinedWindow, UnderdefinedWindow) => true,
            (
                WindowEndsBeforeStart { start: s1, end: e1 },
                WindowEndsBeforeStart { start: s2, end: e2 },
            ) => s1 == s2 && e1 == e2,
            (UnknownTelescope(a), UnknownTelescope(b)) => a == b,
            (UnknownTarget(a), UnknownTarget(b)) => a == b,
            (DuplicateTelescope(a), DuplicateTelescope(b)) => a == b,
            (TooManyTelescopes(a), TooManyTelescopes(b)) => a == b,
            (
                InvalidCatalogRow { name: n1, reason: r1 },
                InvalidCatalogRow { name: n2, reason: r2 },
            ) => n1 == n2 && r1 == r2,

            // Not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (NanCoordinate, NanCoordinate) => true,
            (NoiseInjectionError(a), NoiseInjectionError(b)) => a == b,
            (PeriodFit(a), PeriodFit(b)) => a == b,

            _ => false,
        }
    }
}
