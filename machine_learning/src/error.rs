use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// The corpus (or a bitmap) could not be located, decoded or is empty.
    DataUnavailable(String),
    /// A tensor's dimensions don't match what the consumer expects.
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: String,
    },
    /// Two flat buffers that must be paired have different lengths.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    /// The loss or the gradient stopped being finite.
    NumericInstability {
        what: &'static str,
        epoch: usize,
        batch: usize,
    },
    DeviceUnavailable(String),
    InvalidConfig(String),
    /// A layer was asked for its backward pass without a training forward pass before it.
    NoForwardCache(&'static str),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::DataUnavailable(msg) => format!("Data unavailable: {msg}"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => format!("Shape mismatch for {what}, got {got:?} and expected {expected}"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => format!("There's a size mismatch in {what}, got {got} and expected {expected}"),
            MlErr::LabelOutOfRange { label, classes } => {
                format!("Label {label} is out of range, there are only {classes} classes")
            }
            MlErr::NumericInstability { what, epoch, batch } => format!(
                "The {what} became non-finite at epoch {epoch}, batch {batch}; training halted"
            ),
            MlErr::DeviceUnavailable(msg) => format!("Device unavailable: {msg}"),
            MlErr::InvalidConfig(msg) => format!("Invalid configuration: {msg}"),
            MlErr::NoForwardCache(layer) => {
                format!("The {layer} layer has no forward metadata, run a training forward first")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
