use std::path::Path;

use serde::{Deserialize, Serialize};

/// One BOM row, quantity already multiplied by the build count
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRequirement {
    pub stock_code: String,
    pub required_quantity: i64,
}

/// Zero-based column positions in the BOM CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BomColumns {
    pub quantity: usize,
    pub stock_code: usize,
}

impl Default for BomColumns {
    fn default() -> Self {
        Self {
            quantity: 1,
            stock_code: 4,
        }
    }
}

/// Errors that can occur while reading a BOM
#[derive(Debug, thiserror::Error)]
pub enum BomError {
    #[error("Failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("row {row}: missing column {column}")]
    MissingColumn { row: usize, column: usize },

    #[error("row {row}: invalid quantity '{value}'")]
    InvalidQuantity { row: usize, value: String },

    #[error("build count must be at least 1, got {0}")]
    InvalidBuildCount(i64),
}

/// Parse BOM CSV content (with a header row) into line requirements.
///
/// Each row's quantity is multiplied by `boards`. Blank rows and rows without a
/// stock code are skipped.
pub fn parse_bom_csv(
    csv_content: &str,
    columns: BomColumns,
    boards: i64,
) -> Result<Vec<LineRequirement>, BomError> {
    if boards < 1 {
        return Err(BomError::InvalidBuildCount(boards));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_content.as_bytes());

    let mut lines = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        // Header is row 1
        let row = index + 2;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let field = |column: usize| {
            record
                .get(column)
                .map(str::trim)
                .ok_or(BomError::MissingColumn { row, column })
        };

        let stock_code = field(columns.stock_code)?;
        if stock_code.is_empty() {
            log::warn!("BOM row {row} has no stock code, skipping");
            continue;
        }

        let raw_quantity = field(columns.quantity)?;
        let invalid = || BomError::InvalidQuantity {
            row,
            value: raw_quantity.to_string(),
        };
        let per_board: i64 = raw_quantity.parse().map_err(|_| invalid())?;
        if per_board < 1 {
            return Err(invalid());
        }
        let required_quantity = per_board.checked_mul(boards).ok_or_else(invalid)?;

        lines.push(LineRequirement {
            stock_code: stock_code.to_string(),
            required_quantity,
        });
    }

    log::debug!("Parsed {} BOM lines (x{boards})", lines.len());
    Ok(lines)
}

/// Read and parse a BOM CSV file
pub fn read_bom_csv(
    path: &Path,
    columns: BomColumns,
    boards: i64,
) -> Result<Vec<LineRequirement>, BomError> {
    let content = std::fs::read_to_string(path)?;
    parse_bom_csv(&content, columns, boards)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOM: &str = "\
Designator,Quantity,Value,Manufacturer,Stock Code
\"R1,R2\",2,10k,Yageo,311-10.0KCRCT-ND
C1,1,100nF,Murata,490-1532-1-ND
,,,,
U1,1,MCU,ST,
";

    #[test]
    fn test_parse_bom_multiplies_quantity() {
        let lines = parse_bom_csv(BOM, BomColumns::default(), 10).unwrap();
        assert_eq!(
            lines,
            vec![
                LineRequirement {
                    stock_code: "311-10.0KCRCT-ND".to_string(),
                    required_quantity: 20,
                },
                LineRequirement {
                    stock_code: "490-1532-1-ND".to_string(),
                    required_quantity: 10,
                },
            ]
        );
    }

    #[test]
    fn test_parse_bom_custom_columns() {
        let csv = "Part,Qty\nABC-ND,3\n";
        let columns = BomColumns {
            quantity: 1,
            stock_code: 0,
        };
        let lines = parse_bom_csv(csv, columns, 2).unwrap();
        assert_eq!(lines[0].stock_code, "ABC-ND");
        assert_eq!(lines[0].required_quantity, 6);
    }

    #[test]
    fn test_parse_bom_invalid_quantity() {
        let csv = "a,b,c,d,e\nR1,two,,,X-ND\n";
        let err = parse_bom_csv(csv, BomColumns::default(), 1).unwrap_err();
        assert!(matches!(err, BomError::InvalidQuantity { row: 2, .. }));
        assert_eq!(err.to_string(), "row 2: invalid quantity 'two'");
    }

    #[test]
    fn test_parse_bom_missing_column() {
        let csv = "a,b\nR1,2\n";
        let err = parse_bom_csv(csv, BomColumns::default(), 1).unwrap_err();
        assert!(matches!(err, BomError::MissingColumn { row: 2, column: 4 }));
    }

    #[test]
    fn test_parse_bom_rejects_zero_boards() {
        let err = parse_bom_csv(BOM, BomColumns::default(), 0).unwrap_err();
        assert!(matches!(err, BomError::InvalidBuildCount(0)));
    }

    #[test]
    fn test_read_bom_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        std::fs::write(&path, BOM).unwrap();

        let lines = read_bom_csv(&path, BomColumns::default(), 1).unwrap();
        assert_eq!(lines.len(), 2);
    }
}
