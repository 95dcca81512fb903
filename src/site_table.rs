use crate::newtypes::{Position, SiteId};
use crate::CoalseqError;

/// Row of a [`SiteTable`]
#[derive(Debug, Clone)]
pub struct SiteTableRow {
    pub id: SiteId,
    pub position: Position,
    pub ancestral_state: Vec<u8>,
}

impl PartialEq for SiteTableRow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && crate::util::partial_cmp_equal(&self.position, &other.position)
            && self.ancestral_state == other.ancestral_state
    }
}

/// A site table. Positions are physical coordinates and must be strictly
/// ascending in the canonical ordering.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct SiteTable {
    position: Vec<Position>,
    ancestral_state_length: Vec<u32>,
    ancestral_state: Vec<u8>,
}

impl SiteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of rows
    pub fn num_rows(&self) -> usize {
        self.position.len()
    }

    pub fn add_row<P: Into<Position>>(
        &mut self,
        position: P,
        ancestral_state: &[u8],
    ) -> Result<SiteId, CoalseqError> {
        let id = SiteId::try_from(self.num_rows())?;
        self.position.push(position.into());
        self.ancestral_state_length
            .push(u32::try_from(ancestral_state.len()).map_err(|_| CoalseqError::IndexError)?);
        self.ancestral_state.extend_from_slice(ancestral_state);
        Ok(id)
    }

    pub fn set_columns(
        &mut self,
        position: &[Position],
        ancestral_state: &[u8],
        ancestral_state_length: &[u32],
    ) -> Result<(), CoalseqError> {
        self.clear();
        self.append_columns(position, ancestral_state, ancestral_state_length)
    }

    pub fn append_columns(
        &mut self,
        position: &[Position],
        ancestral_state: &[u8],
        ancestral_state_length: &[u32],
    ) -> Result<(), CoalseqError> {
        if position.len() != ancestral_state_length.len() {
            return Err(value_error!(position.len(), "columns of equal length"));
        }
        let total: usize = ancestral_state_length.iter().map(|l| *l as usize).sum();
        if total != ancestral_state.len() {
            return Err(value_error!(
                ancestral_state.len(),
                "packed state buffer matching ancestral_state_length"
            ));
        }
        self.position.extend_from_slice(position);
        self.ancestral_state_length
            .extend_from_slice(ancestral_state_length);
        self.ancestral_state.extend_from_slice(ancestral_state);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.position.clear();
        self.ancestral_state_length.clear();
        self.ancestral_state.clear();
    }

    /// Return the ``position`` value from row ``row`` of the table.
    ///
    /// # Errors
    ///
    /// Will return [``IndexError``](crate::CoalseqError::IndexError)
    /// if ``row`` is out of range.
    pub fn position<S: Into<SiteId> + Copy>(&self, row: S) -> Result<Position, CoalseqError> {
        self.position
            .get(usize::try_from(row.into())?)
            .copied()
            .ok_or(CoalseqError::IndexError)
    }

    /// Return the ``ancestral_state`` of row ``row``; O(num_rows) due to
    /// the packed buffer.
    pub fn ancestral_state<S: Into<SiteId> + Copy>(&self, row: S) -> Result<&[u8], CoalseqError> {
        let i = usize::try_from(row.into())?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        let offset: usize = self.ancestral_state_length[..i]
            .iter()
            .map(|l| *l as usize)
            .sum();
        Ok(&self.ancestral_state[offset..offset + self.ancestral_state_length[i] as usize])
    }

    pub fn position_slice(&self) -> &[Position] {
        &self.position
    }

    pub fn row<S: Into<SiteId> + Copy>(&self, r: S) -> Result<SiteTableRow, CoalseqError> {
        let id = r.into();
        let i = usize::try_from(id)?;
        if i >= self.num_rows() {
            return Err(CoalseqError::IndexError);
        }
        Ok(SiteTableRow {
            id,
            position: self.position[i],
            ancestral_state: self.ancestral_state(id)?.to_vec(),
        })
    }

    /// Return an iterator over rows of the table.
    /// The value of the iterator is [`SiteTableRow`].
    pub fn iter(&self) -> impl Iterator<Item = SiteTableRow> + '_ {
        crate::table_iterator::make_table_iterator(self)
    }
}

impl<'a> Iterator for crate::table_iterator::TableIterator<&'a SiteTable> {
    type Item = SiteTableRow;

    fn next(&mut self) -> Option<Self::Item> {
        let rv = self.table.row(SiteId::try_from(self.pos).ok()?).ok();
        self.pos += 1;
        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rows() {
        let mut sites = SiteTable::new();
        let a = sites.add_row(0.5, b"0").unwrap();
        let b = sites.add_row(0.75, b"AA").unwrap();
        assert_eq!(sites.num_rows(), 2);
        assert_eq!(sites.position(a).unwrap(), 0.5);
        assert_eq!(sites.ancestral_state(b).unwrap(), b"AA");
    }

    #[test]
    fn test_iteration() {
        let mut sites = SiteTable::new();
        sites.add_row(0.1, b"0").unwrap();
        sites.add_row(0.2, b"1").unwrap();
        let rows: Vec<SiteTableRow> = sites.iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].ancestral_state, b"1");
    }
}
