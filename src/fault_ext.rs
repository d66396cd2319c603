//! Extension traits turning `Option` and `Result` into faults.
//!
//! ```
//! use faultscan::{Fault, fault_ext::{OptionExt, ResultExt}, kind::kinds};
//!
//! fn port(raw: Option<&str>) -> Result<u16, Fault> {
//!     let raw = raw.ok_or_fault(&kinds::KEY_ERROR, "PORT is not set")?;
//!     raw.parse::<u16>()
//!         .or_fault(&kinds::VALUE_ERROR, format!("PORT is not a port: {raw}"))
//! }
//!
//! let fault = port(Some("http")).unwrap_err();
//! assert_eq!(fault.kind().name(), "ValueError");
//! assert!(fault.cause().is_some());
//! ```

use crate::{fault::Fault, into_fault::IntoFault, kind::FaultKind};

/// Extension methods for `Option`.
pub trait OptionExt<T> {
    /// Converts `None` into a fault of `kind` thrown at the caller.
    #[track_caller]
    fn ok_or_fault(self, kind: &'static FaultKind, message: impl Into<String>) -> Result<T, Fault>;
}

impl<T> OptionExt<T> for Option<T> {
    #[track_caller]
    fn ok_or_fault(self, kind: &'static FaultKind, message: impl Into<String>) -> Result<T, Fault> {
        match self {
            Some(value) => Ok(value),
            None => Err(Fault::new(kind, message)),
        }
    }
}

/// Extension methods for `Result`.
pub trait ResultExt<T, E> {
    /// Converts an error into a fault of `kind` caused by it.
    #[track_caller]
    fn or_fault(self, kind: &'static FaultKind, message: impl Into<String>) -> Result<T, Fault>;

    /// Like [`or_fault`](Self::or_fault), building the message only on error.
    #[track_caller]
    fn or_fault_with<M, F>(self, kind: &'static FaultKind, message: F) -> Result<T, Fault>
    where
        M: Into<String>,
        F: FnOnce() -> M;
}

impl<T, E: IntoFault> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn or_fault(self, kind: &'static FaultKind, message: impl Into<String>) -> Result<T, Fault> {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(Fault::new(kind, message).with_cause(error)),
        }
    }

    #[track_caller]
    fn or_fault_with<M, F>(self, kind: &'static FaultKind, message: F) -> Result<T, Fault>
    where
        M: Into<String>,
        F: FnOnce() -> M,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(Fault::new(kind, message()).with_cause(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::kinds;

    #[test]
    fn test_ok_or_fault_locates_caller() {
        let line = line!() + 1;
        let fault = None::<u8>.ok_or_fault(&kinds::KEY_ERROR, "missing").unwrap_err();
        assert_eq!(fault.site().unwrap().line, line);
        assert!(fault.site().unwrap().file.ends_with("fault_ext.rs"));
        assert_eq!(Some(1).ok_or_fault(&kinds::KEY_ERROR, "missing").unwrap(), 1);
    }

    #[test]
    fn test_or_fault_keeps_error_as_cause() {
        let fault = "x"
            .parse::<i32>()
            .or_fault_with(&kinds::RUNTIME_ERROR, || "bad setting")
            .unwrap_err();
        assert_eq!(fault.message(), "bad setting");
        let cause = fault.cause().unwrap();
        assert_eq!(cause.kind().name(), "ValueError");
        assert_eq!(cause.site(), fault.site());
    }
}
