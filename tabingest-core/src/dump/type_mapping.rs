//! SQL type name to generic type conversion.
//!
//! Matching is by substring on the uppercased raw type, checked group by
//! group in a fixed order. The first group with a hit wins, so
//! `DATETIME` is temporal and `POINT` (which contains `INT`) is integer.

use crate::models::GenericType;

const INTEGER_MARKERS: &[&str] = &["INT", "BIGINT", "SMALLINT", "TINYINT"];
const FLOAT_MARKERS: &[&str] = &["DECIMAL", "NUMERIC", "FLOAT", "DOUBLE", "REAL"];
const BOOLEAN_MARKERS: &[&str] = &["BOOL", "BOOLEAN"];
const TEMPORAL_MARKERS: &[&str] = &["DATE", "TIME", "DATETIME", "TIMESTAMP"];

/// Maps a raw SQL type to its generic type.
///
/// Total: anything unrecognized, including the empty string, is
/// [`GenericType::Text`].
///
/// # Example
/// ```rust
/// use tabingest_core::dump::type_mapping::map_sql_type;
/// use tabingest_core::models::GenericType;
///
/// assert_eq!(map_sql_type("varchar(255)"), GenericType::Text);
/// assert_eq!(map_sql_type("BIGINT UNSIGNED"), GenericType::Integer);
/// ```
pub fn map_sql_type(raw_type: &str) -> GenericType {
    let type_upper = raw_type.to_ascii_uppercase();

    let groups: [(&[&str], GenericType); 4] = [
        (INTEGER_MARKERS, GenericType::Integer),
        (FLOAT_MARKERS, GenericType::Float),
        (BOOLEAN_MARKERS, GenericType::Boolean),
        (TEMPORAL_MARKERS, GenericType::Temporal),
    ];

    groups
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| type_upper.contains(m)))
        .map_or(GenericType::Text, |(_, generic)| *generic)
}
