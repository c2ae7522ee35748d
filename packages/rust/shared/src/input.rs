//! Seed article input.
//!
//! Seeds come from a comma-separated file with a header row. Only the columns
//! the pipeline needs are read; fields may be double-quoted.

use std::path::Path;

use crate::error::{QexpError, Result};

/// Read every value of `column` from the seed file at `path`.
pub fn read_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| QexpError::io(path, e))?;
    column_values(&content, column).map_err(|e| match e {
        QexpError::Validation { message } => {
            QexpError::validation(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Seed article ids (`article_id` column).
pub fn read_article_ids(path: &Path) -> Result<Vec<String>> {
    read_column(path, "article_id")
}

/// Distinct parent titles (`parent_title` column), in first-seen order.
pub fn read_parent_titles(path: &Path) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    Ok(read_column(path, "parent_title")?
        .into_iter()
        .filter(|title| seen.insert(title.clone()))
        .collect())
}

fn column_values(content: &str, column: &str) -> Result<Vec<String>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| QexpError::validation("seed file is empty"))?;
    let index = split_record(header)
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| QexpError::validation(format!("missing column `{column}`")))?;

    let mut values = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let record = split_record(line);
        let value = record.get(index).ok_or_else(|| {
            QexpError::validation(format!("row {} has no `{column}` field", line_no + 2))
        })?;
        values.push(value.trim().to_string());
    }
    Ok(values)
}

/// Split one record on commas, honouring double quotes (`""` escapes a quote).
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_column() {
        let csv = "article_id,parent_id,parent_title\n12,1,Alpha\n34,1,Alpha\n56,2,Beta\n";
        assert_eq!(column_values(csv, "article_id").unwrap(), ["12", "34", "56"]);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let csv = "article_id,parent_title\n1,\"Paris, Texas\"\n2,\"The \"\"Quoted\"\" One\"\n";
        assert_eq!(
            column_values(csv, "parent_title").unwrap(),
            ["Paris, Texas", "The \"Quoted\" One"]
        );
    }

    #[test]
    fn missing_column_is_validation_error() {
        let err = column_values("id\n1\n", "article_id").unwrap_err();
        assert!(err.to_string().contains("article_id"));
    }

    #[test]
    fn parent_titles_are_deduplicated_in_order() {
        let dir = std::env::temp_dir().join(format!("qexp-input-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("articles.csv");
        std::fs::write(&path, "article_id,parent_title\n1,B\n2,B\n3,A\n4,B\n").unwrap();

        assert_eq!(read_parent_titles(&path).unwrap(), ["B", "A"]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
