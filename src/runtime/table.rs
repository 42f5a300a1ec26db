//! Funcref tables
//!
//! A table is a growable array of nullable function indices, populated from
//! element segments at instantiation and consulted by `call_indirect`. An
//! empty slot is representable; trapping on it is the caller's decision.

use super::RuntimeError;

#[derive(Debug)]
pub struct Table {
    slots: Vec<Option<u32>>,
    max: Option<u32>,
}

impl Table {
    pub fn new(min: u32, max: Option<u32>) -> Table {
        Table {
            slots: vec![None; min as usize],
            max,
        }
    }

    pub fn size(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn get(&self, index: u32) -> Result<Option<u32>, RuntimeError> {
        self.slots
            .get(index as usize)
            .copied()
            .ok_or(RuntimeError::TableIndexOutOfBounds(index))
    }

    pub fn set(&mut self, index: u32, value: Option<u32>) -> Result<(), RuntimeError> {
        match self.slots.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::TableIndexOutOfBounds(index)),
        }
    }

    /// Grow by `delta` slots filled with `init`. Same sentinel contract as
    /// `memory.grow`: returns the previous size, or `-1` past the limit.
    pub fn grow(&mut self, delta: u32, init: Option<u32>) -> i32 {
        let current = self.slots.len() as u32;
        let new_size = match current.checked_add(delta) {
            Some(n) => n,
            None => return -1,
        };
        if let Some(max) = self.max {
            if new_size > max {
                return -1;
            }
        }
        self.slots.resize(new_size as usize, init);
        current as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut table = Table::new(4, None);
        assert_eq!(table.get(0).unwrap(), None);
        table.set(2, Some(7)).unwrap();
        assert_eq!(table.get(2).unwrap(), Some(7));
        assert_eq!(table.get(4), Err(RuntimeError::TableIndexOutOfBounds(4)));
        assert_eq!(
            table.set(9, None),
            Err(RuntimeError::TableIndexOutOfBounds(9))
        );
    }

    #[test]
    fn test_grow_with_limit() {
        let mut table = Table::new(1, Some(3));
        assert_eq!(table.grow(2, Some(1)), 1);
        assert_eq!(table.size(), 3);
        assert_eq!(table.get(2).unwrap(), Some(1));
        assert_eq!(table.grow(1, None), -1);
        assert_eq!(table.size(), 3);
    }
}
