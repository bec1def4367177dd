//! The set of active cells driving the displayed results.

use abovegrid_types::cell::CellId;
use std::collections::BTreeSet;

/// A set of selected cell ids, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cells: BTreeSet<CellId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection holding exactly one cell.
    pub fn single<I: Into<CellId>>(id: I) -> Self {
        let mut selection = Self::new();
        selection.insert(id);
        selection
    }

    pub fn insert<I: Into<CellId>>(&mut self, id: I) -> bool {
        self.cells.insert(id.into())
    }

    pub fn remove(&mut self, id: &CellId) -> bool {
        self.cells.remove(id)
    }

    /// Flip one cell in or out; returns whether it is selected afterwards.
    pub fn toggle<I: Into<CellId>>(&mut self, id: I) -> bool {
        let id = id.into();
        if self.cells.remove(&id) {
            false
        } else {
            self.cells.insert(id);
            true
        }
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.cells.contains(id)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellId> {
        self.cells.iter()
    }

    pub fn union(&self, other: &Selection) -> Selection {
        self.cells.union(&other.cells).cloned().collect()
    }
}

impl FromIterator<CellId> for Selection {
    fn from_iter<T: IntoIterator<Item = CellId>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a CellId;
    type IntoIter = std::collections::btree_set::Iter<'a, CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
