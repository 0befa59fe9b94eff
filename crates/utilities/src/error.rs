use std::error::Error;

/// The error type used at the I/O and tool boundaries, every module specific
/// error converts into it through `?`.
pub type FsmError = Box<dyn Error>;
