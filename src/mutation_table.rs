use crate::newtypes::{MutationId, NodeId, SiteId};
use crate::CoalseqError;

/// Row of a [`MutationTable`]
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTableRow {
    pub id: MutationId,
    pub site: SiteId,
    pub node: NodeId,
    pub derived_state: Vec<u8>,
}

/// A mutation table. All mutations at a site are stored contiguously in
/// the canonical ordering, and a mutation's only identity is its row
/// index.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct MutationTable {
    site: Vec<SiteId>,
    node: Vec<NodeId>,
    derived_state_length: Vec<u32>,
    derived_state: Vec<u8>,
}

impl MutationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of rows
    pub fn num_rows(&self) -> usize {
        self.site.len()
    }

    pub fn add_row<S: Into<SiteId>, N: Into<NodeId>>(
        &mut self,
        site: S,
        node: N,
        derived_state: &[u8],
    ) -> Result<MutationId, CoalseqError> {
        let id = MutationId::try_from(self.num_rows())?;
        self.site.push(site.into());
        self.node.push(node.into());
        self.derived_state_length
            .push(u32::try_from(derived_state.len()).map_err(|_| CoalseqError::IndexError)?);
        self.derived_state.extend_from_slice(derived_state);
        Ok(id)
    }

    pub fn set_columns(
        &mut self,
        site: &[SiteId],
        node: &[NodeId],
        derived_state: &[u8],
        derived_state_length: &[u32],
    ) -> Result<(), CoalseqError> {
        self.clear();
        self.append_columns(site, node, derived_state, derived_state_length)
    }

    pub fn append_columns(
        &mut self,
        site: &[SiteId],
        node: &[NodeId],
        derived_state: &[u8],
        derived_state_length: &[u32],
    ) -> Result<(), CoalseqError> {
        if site.len() != node.len() || site.len() != derived_state_length.len() {
            return Err(value_error!(site.len(), "columns of equal length"));
        }
        let total: usize = derived_state_length.iter().map(|l| *l as usize).sum();
        if total != derived_state.len() {
            return Err(value_error!(
                derived_state.len(),
                "packed state buffer matching derived_state_length"
            ));
        }
        self.site.extend_from_slice(site);
        self.node.extend_from_slice(node);
        self.derived_state_length
            .extend_from_slice(derived_state_length);
        self.derived_state.extend_from_slice(derived_state);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.site.clear();
        self.node.clear();
        self.derived_state_length.clear();
        self.derived_state.clear();
    }

    /// Return the ``site`` value from row ``row`` of the table.
    ///
    /// # Errors
    ///
    /// Will return [``IndexError``](crate::CoalseqError::IndexError)
    /// if ``row`` is out of range.
    pub fn site<M: Into<MutationId> + Copy>(&self, row: M) -> Result<SiteId, CoalseqError> {
        self.site
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``node`` value from row ``row`` of the table.
    pub fn node<M: Into<MutationId> + Copy>(&self, row: M) -> Result<NodeId, CoalseqError> {
        self.node
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``derived_state`` of row ``row``; O(num_rows) due to the
    /// packed buffer.
    pub fn derived_state<M: Into<MutationId> + Copy>(
        &self,
        row: M,
    ) -> Result<&[u8], CoalseqError> {
        let i = usize::try_from(row.into())?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        let offset: usize = self.derived_state_length[..i]
            .iter()
            .map(|l| *l as usize)
            .sum();
        Ok(&self.derived_state[offset..offset + self.derived_state_length[i] as usize])
    }

    pub fn site_slice(&self) -> &[SiteId] {
        &self.site
    }

    pub fn node_slice(&self) -> &[NodeId] {
        &self.node
    }

    pub fn row<M: Into<MutationId> + Copy>(&self, r: M) -> Result<MutationTableRow, CoalseqError> {
        let id = r.into();
        let i = usize::try_from(id)?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        Ok(MutationTableRow {
            id,
            site: self.site[i],
            node: self.node[i],
            derived_state: self.derived_state(id)?.to_vec(),
        })
    }

    /// Return an iterator over rows of the table.
    /// The value of the iterator is [`MutationTableRow`].
    pub fn iter(&self) -> impl Iterator<Item = MutationTableRow> + '_ {
        crate::table_iterator::make_table_iterator(self)
    }
}

impl<'a> Iterator for crate::table_iterator::TableIterator<&'a MutationTable> {
    type Item = MutationTableRow;

    fn next(&mut self) -> Option<Self::Item> {
        let rv = self.table.row(MutationId::try_from(self.pos).ok()?).ok();
        self.pos += 1;
        rv
    }
}
