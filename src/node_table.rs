use crate::flags::NodeFlags;
use crate::newtypes::{NodeId, PopulationId, Time};
use crate::CoalseqError;

/// Row of a [`NodeTable`]
#[derive(Debug, Clone)]
pub struct NodeTableRow {
    pub id: NodeId,
    pub flags: NodeFlags,
    pub time: Time,
    pub population: PopulationId,
    pub name: Vec<u8>,
}

impl PartialEq for NodeTableRow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.flags == other.flags
            && self.population == other.population
            && crate::util::partial_cmp_equal(&self.time, &other.time)
            && self.name == other.name
    }
}

/// A node table.
///
/// Opaque per-node names live in a shared packed buffer with a parallel
/// length column.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct NodeTable {
    flags: Vec<NodeFlags>,
    time: Vec<Time>,
    population: Vec<PopulationId>,
    name_length: Vec<u32>,
    name: Vec<u8>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of rows
    pub fn num_rows(&self) -> usize {
        self.flags.len()
    }

    pub fn add_row<F: Into<NodeFlags>, T: Into<Time>, P: Into<PopulationId>>(
        &mut self,
        flags: F,
        time: T,
        population: P,
        name: &[u8],
    ) -> Result<NodeId, CoalseqError> {
        let id = NodeId::try_from(self.num_rows())?;
        self.flags.push(flags.into());
        self.time.push(time.into());
        self.population.push(population.into());
        self.name_length
            .push(u32::try_from(name.len()).map_err(|_| CoalseqError::IndexError)?);
        self.name.extend_from_slice(name);
        Ok(id)
    }

    pub fn set_columns(
        &mut self,
        flags: &[NodeFlags],
        time: &[Time],
        population: &[PopulationId],
        name: &[u8],
        name_length: &[u32],
    ) -> Result<(), CoalseqError> {
        self.clear();
        self.append_columns(flags, time, population, name, name_length)
    }

    pub fn append_columns(
        &mut self,
        flags: &[NodeFlags],
        time: &[Time],
        population: &[PopulationId],
        name: &[u8],
        name_length: &[u32],
    ) -> Result<(), CoalseqError> {
        if flags.len() != time.len()
            || flags.len() != population.len()
            || flags.len() != name_length.len()
        {
            return Err(value_error!(flags.len(), "columns of equal length"));
        }
        let total: usize = name_length.iter().map(|l| *l as usize).sum();
        if total != name.len() {
            return Err(value_error!(
                name.len(),
                "packed name buffer matching name_length"
            ));
        }
        self.flags.extend_from_slice(flags);
        self.time.extend_from_slice(time);
        self.population.extend_from_slice(population);
        self.name_length.extend_from_slice(name_length);
        self.name.extend_from_slice(name);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.flags.clear();
        self.time.clear();
        self.population.clear();
        self.name_length.clear();
        self.name.clear();
    }

    /// Return the ``time`` value from row ``row`` of the table.
    ///
    /// # Errors
    ///
    /// Will return [``IndexError``](crate::CoalseqError::IndexError)
    /// if ``row`` is out of range.
    pub fn time<N: Into<NodeId> + Copy>(&self, row: N) -> Result<Time, CoalseqError> {
        self.time
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``flags`` value from row ``row`` of the table.
    pub fn flags<N: Into<NodeId> + Copy>(&self, row: N) -> Result<NodeFlags, CoalseqError> {
        self.flags
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``population`` value from row ``row`` of the table.
    pub fn population<N: Into<NodeId> + Copy>(
        &self,
        row: N,
    ) -> Result<PopulationId, CoalseqError> {
        self.population
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``name`` of row ``row``.
    ///
    /// The packed buffer is offset by the preceding lengths, so this is
    /// O(num_rows); use [`NodeTable::iter`] for bulk access.
    pub fn name<N: Into<NodeId> + Copy>(&self, row: N) -> Result<&[u8], CoalseqError> {
        let i = usize::try_from(row.into())?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        let offset: usize = self.name_length[..i].iter().map(|l| *l as usize).sum();
        Ok(&self.name[offset..offset + self.name_length[i] as usize])
    }

    pub fn is_sample<N: Into<NodeId> + Copy>(&self, row: N) -> bool {
        matches!(self.flags(row.into()), Ok(f) if f.is_sample())
    }

    pub fn time_slice(&self) -> &[Time] {
        &self.time
    }

    pub fn flags_slice(&self) -> &[NodeFlags] {
        &self.flags
    }

    pub fn population_slice(&self) -> &[PopulationId] {
        &self.population
    }

    pub fn row<N: Into<NodeId> + Copy>(&self, r: N) -> Result<NodeTableRow, CoalseqError> {
        let id = r.into();
        let i = usize::try_from(id)?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        Ok(NodeTableRow {
            id,
            flags: self.flags[i],
            time: self.time[i],
            population: self.population[i],
            name: self.name(id)?.to_vec(),
        })
    }

    /// Return an iterator over rows of the table.
    /// The value of the iterator is [`NodeTableRow`].
    pub fn iter(&self) -> impl Iterator<Item = NodeTableRow> + '_ {
        crate::table_iterator::make_table_iterator(self)
    }
}

impl<'a> Iterator for crate::table_iterator::TableIterator<&'a NodeTable> {
    type Item = NodeTableRow;

    fn next(&mut self) -> Option<Self::Item> {
        let rv = self.table.row(NodeId::try_from(self.pos).ok()?).ok();
        self.pos += 1;
        rv
    }
}
