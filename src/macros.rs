/// Creates a [`Fault`](crate::Fault) with a formatted message.
///
/// The first argument is the kind. The rest is interpreted like the
/// arguments of [`format!()`](std::format). The fault records the enclosing
/// function, as returned by [`function!`].
///
/// # Examples
///
/// ```
/// use faultscan::{fault, kind::kinds};
///
/// let user = "ada";
/// let fault = fault!(&kinds::KEY_ERROR, "no user '{user}'");
/// assert_eq!(fault.to_string(), "KeyError: no user 'ada'");
/// assert!(fault.function().unwrap().ends_with("main"));
/// ```
#[macro_export]
macro_rules! fault {
    ($kind:expr, $($arg:tt)+) => {
        $crate::Fault::new($kind, $crate::__private::format!($($arg)+))
            .in_function($crate::function!())
    };
}

/// Returns early with a fault.
///
/// Takes the same arguments as [`fault!`]. This is equivalent to writing
/// `return Err(fault!(...).into());`
///
/// # Examples
///
/// ```
/// use faultscan::{Fault, bail, kind::kinds};
///
/// fn withdraw(balance: u64, amount: u64) -> Result<u64, Fault> {
///     if amount > balance {
///         bail!(&kinds::VALUE_ERROR, "cannot withdraw {amount} from {balance}");
///     }
///     Ok(balance - amount)
/// }
///
/// assert!(withdraw(5, 10).is_err());
/// ```
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return $crate::__private::Err($crate::fault!($($args)+).into())
    };
}

/// The path of the enclosing function, such as `app::billing::charge`.
///
/// Closure markers are stripped, so inside a closure this names the function
/// that defines it.
#[macro_export]
macro_rules! function {
    () => {{
        fn __faultscan_marker() {}
        $crate::__private::enclosing_function($crate::__private::type_name_of(&__faultscan_marker))
    }};
}

/// Builds [`Kwargs`](crate::Kwargs) from `key => value` pairs.
///
/// Each value is rendered with `Display` if it has it, with `Debug`
/// otherwise, and by type name as a last resort. See [`handlers`](crate::handlers).
///
/// # Examples
///
/// ```
/// use faultscan::kwargs;
///
/// let kwargs = kwargs! {
///     "user" => "ada",
///     "ids" => vec![3, 4],
/// };
/// assert_eq!(kwargs.get("ids").unwrap().to_string(), "[3, 4]");
/// ```
#[macro_export]
macro_rules! kwargs {
    () => {
        $crate::Kwargs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        use $crate::__private::kind::*;
        let mut kwargs = $crate::Kwargs::new();
        $(
            let value = $value;
            let handler = (&&&Wrap(&value)).handler();
            kwargs.insert($key, context_value(handler, value));
        )+
        kwargs
    }};
}

/// Records local variables on a fault.
///
/// Values are rendered like the values of [`kwargs!`] and bounded in length.
/// They appear in reports of guards with
/// [`capture_locals`](crate::Options::capture_locals) enabled.
///
/// # Examples
///
/// ```
/// use faultscan::{fault, kind::kinds, locals};
///
/// let attempts = 3;
/// let endpoint = "https://billing.internal";
/// let fault = locals!(fault!(&kinds::RUNTIME_ERROR, "gave up"); attempts, endpoint);
///
/// assert_eq!(fault.locals()[0].value, "3");
/// assert_eq!(fault.locals()[1].value, "https://billing.internal");
/// ```
#[macro_export]
macro_rules! locals {
    ($fault:expr; $($name:ident),+ $(,)?) => {{
        use $crate::__private::kind::*;
        let mut fault: $crate::Fault = $fault;
        $(
            let handler = (&&&Wrap(&$name)).handler();
            record_local(&mut fault, handler, stringify!($name), &$name);
        )+
        fault
    }};
}
