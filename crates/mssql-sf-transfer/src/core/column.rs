//! Column metadata captured during table introspection.

use crate::core::value::ScanType;

/// Parallel per-column arrays for one table's pipeline.
///
/// The i-th entry of every array refers to the same column for the lifetime
/// of the pipeline; rows are decoded, formatted, and declared by position.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Source column names, in ordinal order.
    pub names: Vec<String>,

    /// Upper-cased source type names (e.g. `NVARCHAR`, `DATETIME2`).
    pub db_types: Vec<String>,

    /// Decode strategy per column.
    pub scan_types: Vec<ScanType>,

    /// Warehouse column declarations (`NAME TYPE`), filled by the translator.
    pub names_and_types: Vec<String>,

    /// Numeric precision as reported by the driver. Captured but not emitted
    /// in DDL.
    pub precisions: Vec<i64>,

    /// Numeric scale as reported by the driver. Captured but not emitted in
    /// DDL.
    pub scales: Vec<i64>,

    /// Character/byte lengths as reported by the driver.
    pub lengths: Vec<i64>,

    /// Total column count.
    pub num_cols: usize,
}

impl ColumnInfo {
    /// Record one introspected column. Keeps the arrays aligned.
    pub fn push(
        &mut self,
        name: String,
        db_type: String,
        scan_type: ScanType,
        precision: i64,
        scale: i64,
        length: i64,
    ) {
        self.names.push(name);
        self.db_types.push(db_type);
        self.scan_types.push(scan_type);
        self.precisions.push(precision);
        self.scales.push(scale);
        self.lengths.push(length);
        self.num_cols += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_arrays_aligned() {
        let mut info = ColumnInfo::default();
        info.push("Id".into(), "INT".into(), ScanType::I32, 10, 0, 0);
        info.push("Name".into(), "NVARCHAR".into(), ScanType::Str, 0, 0, 50);

        assert_eq!(info.num_cols, 2);
        assert_eq!(info.names.len(), 2);
        assert_eq!(info.db_types.len(), 2);
        assert_eq!(info.scan_types.len(), 2);
        assert_eq!(info.precisions.len(), 2);
        assert_eq!(info.scales.len(), 2);
        assert_eq!(info.lengths.len(), 2);
        assert_eq!(info.names[1], "Name");
        assert_eq!(info.db_types[1], "NVARCHAR");
    }
}
