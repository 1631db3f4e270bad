//! Squad registry parsing.
//!
//! The registry is a delimited table with a header row naming at least the
//! `Squad` and `Filename` columns. Each row assigns one filename pattern to one
//! squad; rows sharing a squad are merged in row order.

use std::path::Path;

use crate::domain::SquadSpec;
use crate::error::{Result, SquadCovError};
use crate::fs::FileSystem;

/// Delimiter used by registry files unless configured otherwise.
pub const DEFAULT_DELIMITER: char = ';';

const SQUAD_COLUMN: &str = "Squad";
const FILENAME_COLUMN: &str = "Filename";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Read and parse the registry file at `path`.
pub fn load_registry<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    delimiter: char,
) -> Result<Vec<SquadSpec>> {
    if !fs.is_file(path) {
        return Err(SquadCovError::Configuration(format!(
            "squad registry not found: {}",
            path.display()
        )));
    }
    let contents = fs.read_to_string(path)?;
    parse_registry(&contents, delimiter)
}

/// Parse registry contents into squads ordered by first appearance.
pub fn parse_registry(contents: &str, delimiter: char) -> Result<Vec<SquadSpec>> {
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(missing_columns());
    };
    let header = split_row(header.trim_start_matches(BYTE_ORDER_MARK), delimiter);
    let squad_index = column_index(&header, SQUAD_COLUMN)?;
    let filename_index = column_index(&header, FILENAME_COLUMN)?;

    let mut squads: Vec<SquadSpec> = Vec::new();
    for (line_number, line) in lines {
        let cells = split_row(line, delimiter);
        let squad = required_cell(&cells, squad_index, SQUAD_COLUMN, line_number)?;
        let filename = required_cell(&cells, filename_index, FILENAME_COLUMN, line_number)?;

        let position = match squads.iter().position(|spec| spec.name == squad) {
            Some(position) => position,
            None => {
                squads.push(SquadSpec::new(squad, Vec::<String>::new()));
                squads.len() - 1
            }
        };
        let spec = &mut squads[position];
        if spec.patterns.iter().any(|pattern| pattern == filename) {
            log::warn!(
                "line {line_number}: duplicate filename {filename} for squad {squad} ignored"
            );
            continue;
        }
        spec.patterns.push(filename.to_string());
    }

    log::debug!("loaded {} squads from registry", squads.len());
    Ok(squads)
}

fn missing_columns() -> SquadCovError {
    SquadCovError::Configuration(format!(
        "input file must be a valid csv file with the following columns: '{SQUAD_COLUMN}', '{FILENAME_COLUMN}'"
    ))
}

fn column_index(header: &[String], column: &str) -> Result<usize> {
    header
        .iter()
        .position(|name| name == column)
        .ok_or_else(missing_columns)
}

fn required_cell<'a>(
    cells: &'a [String],
    index: usize,
    column: &str,
    line_number: usize,
) -> Result<&'a str> {
    match cells.get(index).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SquadCovError::Configuration(format!(
            "line {line_number}: empty value in column '{column}'"
        ))),
    }
}

/// Split one row, honouring double-quoted cells and `""` escapes.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ch if ch == delimiter && !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            ch => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn merges_rows_by_squad_in_declared_order() {
        let contents = "Squad;Filename\nPayments;Card.swift\nCore;Login.swift\nPayments;Iban.swift\n";
        let squads = parse_registry(contents, ';').expect("parse");

        assert_eq!(
            squads,
            vec![
                SquadSpec::new("Payments", ["Card.swift", "Iban.swift"]),
                SquadSpec::new("Core", ["Login.swift"]),
            ]
        );
    }

    #[test]
    fn columns_can_appear_in_any_order_with_extras() {
        let contents = "Owner;Filename;Squad\nalice;Net;Network\r\n";
        let squads = parse_registry(contents, ';').expect("parse");
        assert_eq!(squads, vec![SquadSpec::new("Network", ["Net"])]);
    }

    #[test]
    fn header_with_byte_order_mark_is_accepted() {
        let contents = "\u{feff}Squad;Filename\nCore;Login.swift\n";
        let squads = parse_registry(contents, ';').expect("parse");
        assert_eq!(squads, vec![SquadSpec::new("Core", ["Login.swift"])]);
    }

    #[test]
    fn supports_custom_delimiter_and_quotes() {
        let contents = "Squad,Filename\n\"Core, iOS\",\"Login \"\"v2\"\".swift\"\n";
        let squads = parse_registry(contents, ',').expect("parse");
        assert_eq!(squads[0].name, "Core, iOS");
        assert_eq!(squads[0].patterns, vec!["Login \"v2\".swift".to_string()]);
    }

    #[test]
    fn skips_blank_lines_and_duplicate_patterns() {
        let contents = "\nSquad;Filename\n\nCore;A.swift\nCore;A.swift\nCore;B.swift\n";
        let squads = parse_registry(contents, ';').expect("parse");
        assert_eq!(squads, vec![SquadSpec::new("Core", ["A.swift", "B.swift"])]);
    }

    #[test]
    fn header_only_registry_is_empty() {
        let squads = parse_registry("Squad;Filename\n", ';').expect("parse");
        assert!(squads.is_empty());
    }

    #[test]
    fn missing_column_is_configuration_error() {
        let error = parse_registry("Team;Filename\nCore;A.swift\n", ';').expect_err("invalid");
        assert!(matches!(error, SquadCovError::Configuration(_)));

        let error = parse_registry("", ';').expect_err("empty");
        assert!(matches!(error, SquadCovError::Configuration(_)));
    }

    #[test]
    fn empty_cells_are_configuration_errors() {
        let error = parse_registry("Squad;Filename\nCore;\n", ';').expect_err("invalid");
        match error {
            SquadCovError::Configuration(message) => {
                assert!(message.contains("line 2"));
                assert!(message.contains("Filename"));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }

        let error = parse_registry("Squad;Filename\nCore;A.swift\n;B.swift\n", ';')
            .expect_err("invalid");
        assert!(matches!(error, SquadCovError::Configuration(message) if message.contains("line 3")));
    }

    #[test]
    fn short_rows_are_configuration_errors() {
        let error = parse_registry("Squad;Filename\nCore\n", ';').expect_err("invalid");
        assert!(matches!(error, SquadCovError::Configuration(_)));
    }

    #[test]
    fn load_registry_reads_through_filesystem() {
        let mut fs = MockFileSystem::new();
        fs.expect_is_file().returning(|_| true);
        fs.expect_read_to_string()
            .returning(|_| Ok("Squad;Filename\nCore;Login.swift\n".to_string()));

        let squads = load_registry(&fs, Path::new("squads.csv"), DEFAULT_DELIMITER).expect("load");
        assert_eq!(squads.len(), 1);
    }

    #[test]
    fn load_registry_reports_missing_file() {
        let mut fs = MockFileSystem::new();
        fs.expect_is_file().returning(|_| false);

        let error = load_registry(&fs, Path::new("squads.csv"), DEFAULT_DELIMITER)
            .expect_err("missing");
        assert!(matches!(error, SquadCovError::Configuration(_)));
        let message = error.to_string();
        assert_eq!(message, "invalid squad registry: squad registry not found: squads.csv");
        assert!(!message.contains("run the tests again"));
    }
}
