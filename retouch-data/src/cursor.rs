//! Cyclic cursor over dataset slots.

use crate::error::DataError;

/// Walks `0..len` forever, wrapping at the end.
///
/// The first call to [`DatasetCursor::advance`] yields `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCursor {
    next: usize,
    len: usize,
}

impl DatasetCursor {
    pub fn new(len: usize) -> Result<Self, DataError> {
        if len == 0 {
            return Err(DataError::Empty("cursor range must be non-empty".into()));
        }
        Ok(Self { next: 0, len })
    }

    /// Build the cursor range from an optional sample pool size.
    ///
    /// `None` walks the whole dataset.
    pub fn for_pool(dataset_len: usize, pool: Option<usize>) -> Result<Self, DataError> {
        Self::new(pool.unwrap_or(dataset_len))
    }

    /// Return the current position and step forward by one.
    pub fn advance(&mut self) -> usize {
        let current = self.next;
        self.next = (self.next + 1) % self.len;
        current
    }

    /// Position the next call to [`advance`](Self::advance) will return.
    pub fn peek(&self) -> usize {
        self.next
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_wraps() {
        let mut cursor = DatasetCursor::new(3).unwrap();
        let seen: Vec<usize> = (0..7).map(|_| cursor.advance()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.peek(), 1);
    }

    #[test]
    fn test_cursor_pool_overrides_dataset_len() {
        assert_eq!(DatasetCursor::for_pool(100, Some(4)).unwrap().len(), 4);
        assert_eq!(DatasetCursor::for_pool(100, None).unwrap().len(), 100);
    }

    #[test]
    fn test_empty_cursor_rejected() {
        assert!(DatasetCursor::new(0).is_err());
    }
}
