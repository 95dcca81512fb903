use crate::newtypes::{EdgeId, NodeId, Position};
use crate::CoalseqError;

/// Row of an [`EdgeTable`]
#[derive(Debug, Clone)]
pub struct EdgeTableRow {
    pub id: EdgeId,
    pub left: Position,
    pub right: Position,
    pub parent: NodeId,
    pub child: NodeId,
}

impl PartialEq for EdgeTableRow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.parent == other.parent
            && self.child == other.child
            && crate::util::partial_cmp_equal(&self.left, &other.left)
            && crate::util::partial_cmp_equal(&self.right, &other.right)
    }
}

/// An edge table.
///
/// An edge asserts that `child` inherits from `parent` on the physical
/// interval `[left, right)`.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EdgeTable {
    left: Vec<Position>,
    right: Vec<Position>,
    parent: Vec<NodeId>,
    child: Vec<NodeId>,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of rows
    pub fn num_rows(&self) -> usize {
        self.left.len()
    }

    pub fn add_row<P: Into<Position>, N: Into<NodeId>>(
        &mut self,
        left: P,
        right: P,
        parent: N,
        child: N,
    ) -> Result<EdgeId, CoalseqError> {
        let id = EdgeId::try_from(self.num_rows())?;
        self.left.push(left.into());
        self.right.push(right.into());
        self.parent.push(parent.into());
        self.child.push(child.into());
        Ok(id)
    }

    pub fn set_columns(
        &mut self,
        left: &[Position],
        right: &[Position],
        parent: &[NodeId],
        child: &[NodeId],
    ) -> Result<(), CoalseqError> {
        self.clear();
        self.append_columns(left, right, parent, child)
    }

    pub fn append_columns(
        &mut self,
        left: &[Position],
        right: &[Position],
        parent: &[NodeId],
        child: &[NodeId],
    ) -> Result<(), CoalseqError> {
        if left.len() != right.len() || left.len() != parent.len() || left.len() != child.len() {
            return Err(value_error!(left.len(), "columns of equal length"));
        }
        self.left.extend_from_slice(left);
        self.right.extend_from_slice(right);
        self.parent.extend_from_slice(parent);
        self.child.extend_from_slice(child);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.parent.clear();
        self.child.clear();
    }

    /// Return the ``left`` value from row ``row`` of the table.
    ///
    /// # Errors
    ///
    /// Will return [``IndexError``](crate::CoalseqError::IndexError)
    /// if ``row`` is out of range.
    pub fn left<E: Into<EdgeId> + Copy>(&self, row: E) -> Result<Position, CoalseqError> {
        self.left
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``right`` value from row ``row`` of the table.
    pub fn right<E: Into<EdgeId> + Copy>(&self, row: E) -> Result<Position, CoalseqError> {
        self.right
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``parent`` value from row ``row`` of the table.
    pub fn parent<E: Into<EdgeId> + Copy>(&self, row: E) -> Result<NodeId, CoalseqError> {
        self.parent
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``child`` value from row ``row`` of the table.
    pub fn child<E: Into<EdgeId> + Copy>(&self, row: E) -> Result<NodeId, CoalseqError> {
        self.child
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    pub fn left_slice(&self) -> &[Position] {
        &self.left
    }

    pub fn right_slice(&self) -> &[Position] {
        &self.right
    }

    pub fn parent_slice(&self) -> &[NodeId] {
        &self.parent
    }

    pub fn child_slice(&self) -> &[NodeId] {
        &self.child
    }

    /// Return row `r` of the table.
    ///
    /// # Errors
    ///
    /// [`CoalseqError::IndexError`] if `r` is out of range.
    pub fn row<E: Into<EdgeId> + Copy>(&self, r: E) -> Result<EdgeTableRow, CoalseqError> {
        let id = r.into();
        let i = usize::try_from(id)?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        Ok(EdgeTableRow {
            id,
            left: self.left[i],
            right: self.right[i],
            parent: self.parent[i],
            child: self.child[i],
        })
    }

    /// Return an iterator over rows of the table.
    /// The value of the iterator is [`EdgeTableRow`].
    pub fn iter(&self) -> impl Iterator<Item = EdgeTableRow> + '_ {
        crate::table_iterator::make_table_iterator(self)
    }

    /// Merge adjacent rows with the same `(parent, child)` whose intervals
    /// abut. A linear scan: only rows adjacent in table order are merged,
    /// so the table should be canonically sorted first.
    pub fn squash(&mut self) {
        if self.num_rows() < 2 {
            return;
        }
        let mut out = 0usize;
        for i in 1..self.num_rows() {
            if self.parent[i] == self.parent[out]
                && self.child[i] == self.child[out]
                && crate::util::partial_cmp_equal(&self.left[i], &self.right[out])
            {
                self.right[out] = self.right[i];
            } else {
                out += 1;
                self.left[out] = self.left[i];
                self.right[out] = self.right[i];
                self.parent[out] = self.parent[i];
                self.child[out] = self.child[i];
            }
        }
        self.left.truncate(out + 1);
        self.right.truncate(out + 1);
        self.parent.truncate(out + 1);
        self.child.truncate(out + 1);
    }
}

impl<'a> Iterator for crate::table_iterator::TableIterator<&'a EdgeTable> {
    type Item = EdgeTableRow;

    fn next(&mut self) -> Option<Self::Item> {
        let rv = self.table.row(EdgeId::try_from(self.pos).ok()?).ok();
        self.pos += 1;
        rv
    }
}
