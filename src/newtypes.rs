//! Strongly-typed identifiers and coordinates.
//!
//! Row ids are thin wrappers around `i32` with `-1` as the null value.
//! [`Position`] and [`Time`] wrap `f64` and support arithmetic and
//! comparison against raw floats.

/// A node ID
///
/// This is an integer referring to a row of a [``NodeTable``](crate::NodeTable).
///
/// # Examples
///
/// These examples illustrate using this type as something "integer-like".
///
/// ```
/// use coalseq::NodeId;
///
/// // The default value is null:
/// assert_eq!(NodeId::default(), NodeId::NULL);
///
/// let y: NodeId = NodeId::from(1);
/// assert_eq!(1, y);
/// assert_eq!(y, 1);
///
/// assert!(y < 2);
/// assert!(y <= 1);
/// assert!(2 > y);
/// ```
///
/// The types also implement `Display`:
///
/// ```
/// use coalseq::NodeId;
///
/// let n = NodeId::from(11);
/// assert_eq!(format!("{}", n), "11".to_string());
/// let n = NodeId::NULL;
/// assert_eq!(format!("{}", n), "NULL");
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(i32);

/// An edge ID
///
/// This is an integer referring to a row of an [``EdgeTable``](crate::EdgeTable).
///
/// The features for this type follow the same pattern as for [``NodeId``]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(i32);

/// A population ID
///
/// The features for this type follow the same pattern as for [``NodeId``]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationId(i32);

/// A site ID
///
/// This is an integer referring to a row of a [``SiteTable``](crate::SiteTable).
///
/// The features for this type follow the same pattern as for [``NodeId``]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteId(i32);

/// A mutation ID
///
/// This is an integer referring to a row of a [``MutationTable``](crate::MutationTable).
/// A mutation has no identity beyond its table index.
///
/// The features for this type follow the same pattern as for [``NodeId``]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MutationId(i32);

/// A migration ID
///
/// This is an integer referring to a row of a [``MigrationTable``](crate::MigrationTable).
///
/// The features for this type follow the same pattern as for [``NodeId``]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MigrationId(i32);

impl_id_traits!(NodeId);
impl_id_traits!(EdgeId);
impl_id_traits!(PopulationId);
impl_id_traits!(SiteId);
impl_id_traits!(MutationId);
impl_id_traits!(MigrationId);

/// A newtype for the concept of "genomic position" in physical
/// (sequence-length) units.
/// A `Position` can represent either a locus or a distance between loci.
///
/// Wraps [`f64`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position(f64);

/// A newtype for the concept of time.
/// A `Time` value can represent either a point in time
/// or the output of arithmetic involving time.
///
/// Wraps [`f64`].
///
/// # Examples
///
/// ```
/// let t0 = coalseq::Time::from(2.0);
/// let t1 = coalseq::Time::from(10.0);
///
/// let sum = t0 + t1;
///
/// match sum.partial_cmp(&12.0) {
///    Some(std::cmp::Ordering::Equal) => (),
///    _ => assert!(false),
/// };
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(f64);

impl_f64_newtype_traits!(Position);
impl_f64_newtype_traits!(Time);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_default() {
        assert_eq!(NodeId::default(), NodeId::NULL);
        assert_eq!(EdgeId::default(), EdgeId::NULL);
        assert!(PopulationId::NULL.is_null());
    }

    #[test]
    fn test_comparisons_with_raw_values() {
        let n = NodeId::from(3);
        assert_eq!(n, 3);
        assert!(n < 4);
        assert!(2 < n);
        let p = Position::from(1.5);
        assert!(p > 1.0);
        assert!(0.5 < p);
        assert_eq!(f64::from(p), 1.5);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", NodeId::from(11)), "11");
        assert_eq!(format!("{}", NodeId::NULL), "NULL");
    }

    #[test]
    fn test_round_trips() {
        let s = SiteId::try_from(7_usize).unwrap();
        assert_eq!(usize::try_from(s).unwrap(), 7);
        assert!(usize::try_from(SiteId::NULL).is_err());
    }
}
