//! Adapters that turn callables into guardable targets.
//!
//! A guard needs to know how to invoke its target. The adapters here cover
//! blocking and suspending callables, with or without a receiver, with or
//! without access to the call's keyword arguments:
//!
//! | | free function | with keyword arguments | with receiver |
//! |---|---|---|---|
//! | blocking | [`blocking`] | [`blocking_with_context`] | [`method`] |
//! | suspending | [`suspending`] | [`suspending_with_context`] | [`suspending_method`] |
//!
//! Associated functions without a receiver are free functions.
//!
//! Targets take their positional arguments as one tuple and fail with any
//! error that implements [`IntoFault`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use faultscan::{Fault, guard::adapter, kind::kinds};
//!
//! struct Ledger {
//!     balance: u64,
//! }
//!
//! impl Ledger {
//!     fn withdraw(&self, amount: u64) -> Result<u64, Fault> {
//!         self.balance
//!             .checked_sub(amount)
//!             .ok_or_else(|| Fault::new(&kinds::VALUE_ERROR, "insufficient funds"))
//!     }
//! }
//!
//! let divide = adapter::blocking(|(a, b): (i32, i32)| {
//!     a.checked_div(b)
//!         .ok_or_else(|| Fault::new(&kinds::ZERO_DIVISION_ERROR, "division by zero"))
//! });
//! let withdraw = adapter::method(Arc::new(Ledger { balance: 10 }), |ledger: &Ledger, (amount,): (u64,)| {
//!     ledger.withdraw(amount)
//! });
//! # let _ = (divide, withdraw);
//! ```

use core::future::Future;
use std::sync::Arc;

use crate::{fault::Fault, guard::metadata::FunctionMetadata, into_fault::IntoFault, value::Kwargs};

/// Anything a guard can wrap.
pub trait Target {
    /// The type name used to name the target when no metadata is given.
    fn target_name(&self) -> &'static str;

    /// Metadata the target already carries, if it is itself guarded.
    fn target_metadata(&self) -> Option<&triomphe::Arc<FunctionMetadata>> {
        None
    }
}

/// A blocking target taking the positional arguments `A`.
pub trait Invoke<A>: Target {
    /// The value returned on success.
    type Output;

    /// Runs the target.
    fn invoke(&self, args: A, kwargs: Kwargs) -> Result<Self::Output, Fault>;
}

/// A suspending target taking the positional arguments `A`.
pub trait InvokeAsync<A>: Target {
    /// The value returned on success.
    type Output;

    /// Starts the target. The returned future runs it.
    fn invoke_async(
        &self,
        args: A,
        kwargs: Kwargs,
    ) -> impl Future<Output = Result<Self::Output, Fault>> + Send;
}

/// A blocking free function. See [`blocking`].
#[derive(Clone, Debug)]
pub struct Blocking<F>(F);

/// A blocking free function that receives the filtered keyword arguments.
/// See [`blocking_with_context`].
#[derive(Clone, Debug)]
pub struct BlockingWithContext<F>(F);

/// A blocking function bound to a receiver. See [`method`].
#[derive(Debug)]
pub struct Method<R, F> {
    receiver: Arc<R>,
    function: F,
}

/// A suspending free function. See [`suspending`].
#[derive(Clone, Debug)]
pub struct Suspending<F>(F);

/// A suspending free function that receives the filtered keyword arguments.
/// See [`suspending_with_context`].
#[derive(Clone, Debug)]
pub struct SuspendingWithContext<F>(F);

/// A suspending function bound to a receiver. See [`suspending_method`].
#[derive(Debug)]
pub struct SuspendingMethod<R, F> {
    receiver: Arc<R>,
    function: F,
}

/// Adapts `Fn(A) -> Result<T, E>`.
pub fn blocking<F>(function: F) -> Blocking<F> {
    Blocking(function)
}

/// Adapts `Fn(A, Kwargs) -> Result<T, E>`.
pub fn blocking_with_context<F>(function: F) -> BlockingWithContext<F> {
    BlockingWithContext(function)
}

/// Adapts `Fn(&R, A) -> Result<T, E>` with a shared receiver.
pub fn method<R, F>(receiver: Arc<R>, function: F) -> Method<R, F> {
    Method { receiver, function }
}

/// Adapts `Fn(A) -> impl Future<Output = Result<T, E>>`.
pub fn suspending<F>(function: F) -> Suspending<F> {
    Suspending(function)
}

/// Adapts `Fn(A, Kwargs) -> impl Future<Output = Result<T, E>>`.
pub fn suspending_with_context<F>(function: F) -> SuspendingWithContext<F> {
    SuspendingWithContext(function)
}

/// Adapts `Fn(Arc<R>, A) -> impl Future<Output = Result<T, E>>` with a
/// shared receiver.
pub fn suspending_method<R, F>(receiver: Arc<R>, function: F) -> SuspendingMethod<R, F> {
    SuspendingMethod { receiver, function }
}

impl<R, F: Clone> Clone for Method<R, F> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
            function: self.function.clone(),
        }
    }
}

impl<R, F: Clone> Clone for SuspendingMethod<R, F> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
            function: self.function.clone(),
        }
    }
}

macro_rules! target_named_after {
    ($function:ident; $($adapter:tt)+) => {
        impl<$function, $($adapter)+ {
            fn target_name(&self) -> &'static str {
                core::any::type_name::<$function>()
            }
        }
    };
}

target_named_after!(F; > Target for Blocking<F>);
target_named_after!(F; > Target for BlockingWithContext<F>);
target_named_after!(F; R> Target for Method<R, F>);
target_named_after!(F; > Target for Suspending<F>);
target_named_after!(F; > Target for SuspendingWithContext<F>);
target_named_after!(F; R> Target for SuspendingMethod<R, F>);

impl<F, A, T, E> Invoke<A> for Blocking<F>
where
    F: Fn(A) -> Result<T, E>,
    E: IntoFault,
{
    type Output = T;

    fn invoke(&self, args: A, _kwargs: Kwargs) -> Result<T, Fault> {
        (self.0)(args).map_err(IntoFault::into_fault_unlocated)
    }
}

impl<F, A, T, E> Invoke<A> for BlockingWithContext<F>
where
    F: Fn(A, Kwargs) -> Result<T, E>,
    E: IntoFault,
{
    type Output = T;

    fn invoke(&self, args: A, kwargs: Kwargs) -> Result<T, Fault> {
        (self.0)(args, kwargs).map_err(IntoFault::into_fault_unlocated)
    }
}

impl<R, F, A, T, E> Invoke<A> for Method<R, F>
where
    F: Fn(&R, A) -> Result<T, E>,
    E: IntoFault,
{
    type Output = T;

    fn invoke(&self, args: A, _kwargs: Kwargs) -> Result<T, Fault> {
        (self.function)(&self.receiver, args).map_err(IntoFault::into_fault_unlocated)
    }
}

impl<F, Fut, A, T, E> InvokeAsync<A> for Suspending<F>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send,
    E: IntoFault,
{
    type Output = T;

    fn invoke_async(&self, args: A, _kwargs: Kwargs) -> impl Future<Output = Result<T, Fault>> + Send {
        let future = (self.0)(args);
        async move { future.await.map_err(IntoFault::into_fault_unlocated) }
    }
}

impl<F, Fut, A, T, E> InvokeAsync<A> for SuspendingWithContext<F>
where
    F: Fn(A, Kwargs) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send,
    E: IntoFault,
{
    type Output = T;

    fn invoke_async(&self, args: A, kwargs: Kwargs) -> impl Future<Output = Result<T, Fault>> + Send {
        let future = (self.0)(args, kwargs);
        async move { future.await.map_err(IntoFault::into_fault_unlocated) }
    }
}

impl<R, F, Fut, A, T, E> InvokeAsync<A> for SuspendingMethod<R, F>
where
    F: Fn(Arc<R>, A) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send,
    E: IntoFault,
{
    type Output = T;

    fn invoke_async(&self, args: A, _kwargs: Kwargs) -> impl Future<Output = Result<T, Fault>> + Send {
        let future = (self.function)(Arc::clone(&self.receiver), args);
        async move { future.await.map_err(IntoFault::into_fault_unlocated) }
    }
}
