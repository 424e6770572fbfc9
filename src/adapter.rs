//! Re-typing a future's result through converters.

use crate::convert::Converter;
use crate::error::Error;
use crate::future::{promise, Completed, OperationFuture, Outcome, Promise};
use crate::tracing_shim::warn;
use std::fmt;
use std::sync::Arc;

/// The future returned to callers of a command.
pub type CommandFuture<T, I> = OperationFuture<T, I>;

/// Completes a client-typed future from the outcome of a core-typed one.
///
/// Successes are converted; failures and cancellation pass through untouched. A converter
/// error fails only the adapted future with [`Error::Conversion`], leaving the core future's
/// success in place. Cancelling the adapted future cancels the core future.
pub struct FutureAdapter<CoreT, CoreI, T, I> {
    promise: Promise<T, I>,
    response_converter: Arc<dyn Converter<CoreT, T>>,
    info_converter: Arc<dyn Converter<CoreI, I>>,
}

impl<CoreT, CoreI, T, I> FutureAdapter<CoreT, CoreI, T, I>
where
    CoreT: Send + Sync + 'static,
    CoreI: Send + Sync + 'static,
{
    /// Create an adapter for `core` along with the future it completes.
    ///
    /// Nothing happens until the adapter is given the core outcome, usually by registering
    /// [`FutureAdapter::complete_from`] as a listener on `core`. [`adapt`] does both.
    pub fn new(
        core: &OperationFuture<CoreT, CoreI>,
        response_converter: Arc<dyn Converter<CoreT, T>>,
        info_converter: Arc<dyn Converter<CoreI, I>>,
    ) -> (Self, OperationFuture<T, I>) {
        let (promise, future) = promise();
        let adapter = Self {
            promise,
            response_converter,
            info_converter,
        };
        (adapter, future.with_upstream(core.as_cancel()))
    }
}

impl<CoreT, CoreI, T, I> FutureAdapter<CoreT, CoreI, T, I> {
    /// Complete the adapted future from the core outcome. Returns `false` if it had already
    /// completed.
    pub fn complete_from(&self, outcome: &Outcome<CoreT, CoreI>) -> bool {
        let adapted = match outcome {
            Ok(completed) => self.convert(completed),
            Err(error) => Err(error.clone()),
        };
        self.promise.complete(adapted)
    }

    fn convert(&self, core: &Completed<CoreT, CoreI>) -> Outcome<T, I> {
        let converted = self.response_converter.convert(&core.response).and_then(|response| {
            let info = self.info_converter.convert(&core.info)?;
            Ok(Completed { response, info })
        });
        converted.map_err(|error| {
            warn!(%error, "response conversion failed");
            Error::from(error)
        })
    }
}

impl<CoreT, CoreI, T, I> fmt::Debug for FutureAdapter<CoreT, CoreI, T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureAdapter")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

/// Adapt `core` through the given converters.
///
/// The returned future may itself be adapted again.
pub fn adapt<CoreT, CoreI, T, I>(
    core: &OperationFuture<CoreT, CoreI>,
    response_converter: Arc<dyn Converter<CoreT, T>>,
    info_converter: Arc<dyn Converter<CoreI, I>>,
) -> CommandFuture<T, I>
where
    CoreT: Send + Sync + 'static,
    CoreI: Send + Sync + 'static,
    T: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    let (adapter, future) = FutureAdapter::new(core, response_converter, info_converter);
    core.on_complete(move |outcome| {
        let _completed = adapter.complete_from(outcome);
    });
    future
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::convert::{from_fn, Identity};
    use crate::error::ConversionError;
    use futures::FutureExt as _;

    fn length() -> Arc<dyn Converter<String, usize>> {
        Arc::new(from_fn(|s: &String| Ok(s.len())))
    }

    fn upper() -> Arc<dyn Converter<String, String>> {
        Arc::new(from_fn(|s: &String| Ok(s.to_uppercase())))
    }

    fn rejecting<S: 'static, D: 'static>() -> Arc<dyn Converter<S, D>> {
        Arc::new(from_fn::<S, D, _>(|_: &S| {
            Err(ConversionError::new("rejected"))
        }))
    }

    #[test]
    fn success_is_converted() {
        let (core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, length(), upper());

        assert!(core_promise.succeed("row".to_owned(), "select".to_owned()));
        assert_eq!(
            adapted.now_or_never(),
            Some(Ok(Completed {
                response: 3,
                info: "SELECT".to_owned()
            }))
        );
    }

    #[test]
    fn response_conversion_failure_leaves_core_success() {
        let (core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, rejecting::<String, usize>(), upper());

        assert!(core_promise.succeed("row".to_owned(), "select".to_owned()));
        assert_eq!(
            adapted.outcome(),
            Some(Err(Error::Conversion(ConversionError::new("rejected"))))
        );
        assert!(matches!(core.outcome(), Some(Ok(_))));
    }

    #[test]
    fn info_conversion_failure_fails_adapted_future() {
        let (core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, length(), rejecting::<String, String>());

        assert!(core_promise.succeed("row".to_owned(), "select".to_owned()));
        assert!(matches!(adapted.outcome(), Some(Err(Error::Conversion(_)))));
    }

    #[test]
    fn failures_pass_through_untouched() {
        let (core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, rejecting::<String, usize>(), upper());

        assert!(core_promise.fail(Error::transport("reset")));
        assert_eq!(adapted.outcome(), Some(Err(Error::transport("reset"))));
    }

    #[test]
    fn cancelling_the_adapter_cancels_the_core() {
        let (core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, length(), upper());

        assert!(adapted.cancel());
        assert!(core.is_cancelled());
        assert!(adapted.is_cancelled());
        assert!(core_promise.is_complete());
        assert!(!adapted.cancel());
    }

    #[test]
    fn core_cancellation_reaches_the_adapter() {
        let (_core_promise, core) = promise::<String, String>();
        let adapted = adapt(&core, length(), upper());

        assert!(core.cancel());
        assert_eq!(adapted.outcome(), Some(Err(Error::Cancelled)));
    }

    #[test]
    fn adapting_an_already_completed_future() {
        let (core_promise, core) = promise::<String, String>();
        assert!(core_promise.succeed("done".to_owned(), "info".to_owned()));

        let adapted = adapt(&core, length(), Arc::new(Identity));
        assert_eq!(
            adapted.outcome(),
            Some(Ok(Completed {
                response: 4,
                info: "info".to_owned()
            }))
        );
    }

    #[test]
    fn adapters_chain() {
        let (core_promise, core) = promise::<String, String>();
        let first = adapt(&core, upper(), Arc::new(Identity));
        let second = adapt(&first, length(), upper());

        assert!(core_promise.succeed("abc".to_owned(), "q".to_owned()));
        assert_eq!(
            second.outcome(),
            Some(Ok(Completed {
                response: 3,
                info: "Q".to_owned()
            }))
        );

        let (_core_promise, core) = promise::<String, String>();
        let first = adapt(&core, upper(), Arc::new(Identity));
        let second = adapt(&first, length(), upper());
        assert!(second.cancel());
        assert!(core.is_cancelled());
        assert!(first.is_cancelled());
    }
}
