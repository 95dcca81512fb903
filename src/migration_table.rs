use crate::newtypes::{MigrationId, NodeId, PopulationId, Position, Time};
use crate::CoalseqError;

/// Row of a [`MigrationTable`]
#[derive(Debug, Clone)]
pub struct MigrationTableRow {
    pub id: MigrationId,
    pub left: Position,
    pub right: Position,
    pub node: NodeId,
    pub source: PopulationId,
    pub dest: PopulationId,
    pub time: Time,
}

impl PartialEq for MigrationTableRow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.node == other.node
            && self.source == other.source
            && self.dest == other.dest
            && crate::util::partial_cmp_equal(&self.left, &other.left)
            && crate::util::partial_cmp_equal(&self.right, &other.right)
            && crate::util::partial_cmp_equal(&self.time, &other.time)
    }
}

/// A migration table, recording the movement of ancestral material
/// between populations.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct MigrationTable {
    left: Vec<Position>,
    right: Vec<Position>,
    node: Vec<NodeId>,
    source: Vec<PopulationId>,
    dest: Vec<PopulationId>,
    time: Vec<Time>,
}

impl MigrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of rows
    pub fn num_rows(&self) -> usize {
        self.left.len()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_row<P: Into<Position>, N: Into<NodeId>, I: Into<PopulationId>, T: Into<Time>>(
        &mut self,
        left: P,
        right: P,
        node: N,
        source: I,
        dest: I,
        time: T,
    ) -> Result<MigrationId, CoalseqError> {
        let id = MigrationId::try_from(self.num_rows())?;
        self.left.push(left.into());
        self.right.push(right.into());
        self.node.push(node.into());
        self.source.push(source.into());
        self.dest.push(dest.into());
        self.time.push(time.into());
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_columns(
        &mut self,
        left: &[Position],
        right: &[Position],
        node: &[NodeId],
        source: &[PopulationId],
        dest: &[PopulationId],
        time: &[Time],
    ) -> Result<(), CoalseqError> {
        self.clear();
        self.append_columns(left, right, node, source, dest, time)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append_columns(
        &mut self,
        left: &[Position],
        right: &[Position],
        node: &[NodeId],
        source: &[PopulationId],
        dest: &[PopulationId],
        time: &[Time],
    ) -> Result<(), CoalseqError> {
        if left.len() != right.len()
            || left.len() != node.len()
            || left.len() != source.len()
            || left.len() != dest.len()
            || left.len() != time.len()
        {
            return Err(value_error!(left.len(), "columns of equal length"));
        }
        self.left.extend_from_slice(left);
        self.right.extend_from_slice(right);
        self.node.extend_from_slice(node);
        self.source.extend_from_slice(source);
        self.dest.extend_from_slice(dest);
        self.time.extend_from_slice(time);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.node.clear();
        self.source.clear();
        self.dest.clear();
        self.time.clear();
    }

    pub fn time<M: Into<MigrationId> + Copy>(&self, row: M) -> Result<Time, CoalseqError> {
        self.time
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    pub fn node<M: Into<MigrationId> + Copy>(&self, row: M) -> Result<NodeId, CoalseqError> {
        self.node
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    pub fn time_slice(&self) -> &[Time] {
        &self.time
    }

    pub fn row<M: Into<MigrationId> + Copy>(
        &self,
        r: M,
    ) -> Result<MigrationTableRow, CoalseqError> {
        let id = r.into();
        let i = usize::try_from(id)?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        Ok(MigrationTableRow {
            id,
            left: self.left[i],
            right: self.right[i],
            node: self.node[i],
            source: self.source[i],
            dest: self.dest[i],
            time: self.time[i],
        })
    }

    /// Return an iterator over rows of the table.
    /// The value of the iterator is [`MigrationTableRow`].
    pub fn iter(&self) -> impl Iterator<Item = MigrationTableRow> + '_ {
        crate::table_iterator::make_table_iterator(self)
    }
}

impl<'a> Iterator for crate::table_iterator::TableIterator<&'a MigrationTable> {
    type Item = MigrationTableRow;

    fn next(&mut self) -> Option<Self::Item> {
        let rv = self.table.row(MigrationId::try_from(self.pos).ok()?).ok();
        self.pos += 1;
        rv
    }
}
