//! Mapping core protocol values onto client values.

use crate::error::ConversionError;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

/// A pure mapping from a core value to a client value.
///
/// Converters are shared between the thread delivering responses and the caller, so they must
/// be stateless and thread-safe.
pub trait Converter<S, D>: Send + Sync {
    /// Map `source` onto its client representation.
    fn convert(&self, source: &S) -> Result<D, ConversionError>;
}

/// The converter used when the client type and the core type are the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl<T> Converter<T, T> for Identity
where
    T: Clone,
{
    #[inline]
    fn convert(&self, source: &T) -> Result<T, ConversionError> {
        Ok(source.clone())
    }
}

impl<S, D, F> Converter<S, D> for F
where
    F: Fn(&S) -> Result<D, ConversionError> + Send + Sync,
{
    #[inline]
    fn convert(&self, source: &S) -> Result<D, ConversionError> {
        self(source)
    }
}

/// Fix the signature of a closure so that it is usable as a [`Converter`].
///
/// Closures passed straight to a `Converter` bound cannot have their argument lifetime
/// inferred; routing them through this function can.
#[inline]
pub fn from_fn<S, D, F>(f: F) -> F
where
    F: Fn(&S) -> Result<D, ConversionError> + Send + Sync,
{
    f
}

/// A lazy, read-only view converting each element of an iterator as it is reached.
///
/// Created by [`convert_each`]. Each element is converted exactly once, when it is yielded.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Converted<It, C, D> {
    iter: It,
    converter: C,
    target: PhantomData<fn() -> D>,
}

/// View `iter` through `converter` without collecting it first.
#[inline]
pub fn convert_each<It, C, D>(iter: It, converter: C) -> Converted<It::IntoIter, C, D>
where
    It: IntoIterator,
    C: Converter<It::Item, D>,
{
    Converted {
        iter: iter.into_iter(),
        converter,
        target: PhantomData,
    }
}

impl<It, C, D> Iterator for Converted<It, C, D>
where
    It: Iterator,
    C: Converter<It::Item, D>,
{
    type Item = Result<D, ConversionError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let source = self.iter.next()?;
        Some(self.converter.convert(&source))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<It, C, D> ExactSizeIterator for Converted<It, C, D>
where
    It: ExactSizeIterator,
    C: Converter<It::Item, D>,
{
}

impl<It, C, D> FusedIterator for Converted<It, C, D>
where
    It: FusedIterator,
    C: Converter<It::Item, D>,
{
}

impl<It, C, D> fmt::Debug for Converted<It, C, D>
where
    It: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converted")
            .field("iter", &self.iter)
            .finish_non_exhaustive()
    }
}
