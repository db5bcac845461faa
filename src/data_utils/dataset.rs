use crate::error::Result;

/// Random-access dataset consumed by batching code.
///
/// Implementations are built once and then read concurrently: `get` takes
/// `&self` and must not mutate shared state.
pub trait Dataset: Send + Sync {
    type Item;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Loads the item at `index`, failing with `IndexOutOfRange` when
    /// `index >= len()`.
    fn get(&self, index: usize) -> Result<Self::Item>;
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(crate::error::Error::IndexOutOfRange { index, len });
    }
    Ok(())
}
