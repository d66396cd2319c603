//! Commonly used items for convenient importing.
//!
//! ```rust
//! use faultscan::prelude::*;
//!
//! fn parse_port(raw: &str) -> Result<u16, Fault> {
//!     if raw.is_empty() {
//!         bail!(&kinds::VALUE_ERROR, "empty port");
//!     }
//!     raw.parse::<u16>().or_fault(&kinds::VALUE_ERROR, "not a port")
//! }
//!
//! let scanner = Scanner::new();
//! let parse = scanner.wrap(adapter::blocking(|(raw,): (&str,)| parse_port(raw)));
//! assert_eq!(parse.call(("8080",), kwargs! {}).unwrap(), Outcome::Completed(8080));
//! ```

pub use crate::{
    Fault, Handler, IntoFault, Kwargs, Options, Outcome, Scanner, bail, fault,
    fault_ext::{OptionExt, ResultExt},
    guard::adapter,
    kind::kinds,
    kwargs, locals,
};
