//! Source, transform and sink seams of a chunk step.

use async_trait::async_trait;

use super::skip::StepError;

/// Item stream feeding a chunk step.
#[async_trait]
pub trait Source<I>: Send + Sync {
    /// Next item, or `None` at end of stream.
    async fn read(&mut self) -> Result<Option<I>, StepError>;

    /// Estimate of how many items the stream holds.
    async fn count(&self) -> Result<i64, StepError>;
}

/// Per-item conversion.
#[async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn process(&mut self, item: &I) -> Result<O, StepError>;
}

/// Chunk consumer. A write commits the whole chunk or none of it.
#[async_trait]
pub trait Sink<O>: Send + Sync {
    async fn write(&mut self, chunk: &[O]) -> Result<(), StepError>;
}

/// Source over a fixed list.
pub struct ListSource<I> {
    items: std::vec::IntoIter<I>,
    len: i64,
}

impl<I> ListSource<I> {
    pub fn new(items: Vec<I>) -> Self {
        let len = items.len() as i64;
        Self {
            items: items.into_iter(),
            len,
        }
    }
}

#[async_trait]
impl<I: Send + Sync> Source<I> for ListSource<I> {
    async fn read(&mut self) -> Result<Option<I>, StepError> {
        Ok(self.items.next())
    }

    async fn count(&self) -> Result<i64, StepError> {
        Ok(self.len)
    }
}

/// Transform backed by a plain function.
pub struct FnTransform<F>(pub F);

#[async_trait]
impl<I, O, F> Transform<I, O> for FnTransform<F>
where
    I: Send + Sync,
    O: Send,
    F: FnMut(&I) -> Result<O, StepError> + Send + Sync,
{
    async fn process(&mut self, item: &I) -> Result<O, StepError> {
        (self.0)(item)
    }
}
