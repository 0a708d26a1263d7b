use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::api::{ExposureParameters, Field, FieldId};

/// Columns of the plain-text tile lists distributed alongside alerts
const TXT_COLUMNS: &[&str] = &["rank_id", "id", "ra", "dec", "weight", "date", "time"];

/// Parse a text tile list from a file
pub fn parse_txt_plan_file(path: &Path) -> Result<Vec<Field>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text plan: {}", path.display()))?;

    parse_txt_plan_str(&content)
        .with_context(|| format!("Failed to parse text plan: {}", path.display()))
}

/// Parse a text tile list.
///
/// The first line is a header and is ignored; every following non-empty line
/// holds `rank_id id ra dec weight date time`. Rank and timestamp columns are
/// dropped and every tile gets an R-band 120 s exposure.
pub fn parse_txt_plan_str(content: &str) -> Result<Vec<Field>> {
    let mut fields = Vec::new();

    for (lineno, line) in content.lines().enumerate().skip(1) {
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.is_empty() {
            continue;
        }
        if values.len() < TXT_COLUMNS.len() {
            bail!(
                "Line {}: expected {} columns ({}), found {}",
                lineno + 1,
                TXT_COLUMNS.len(),
                TXT_COLUMNS.join(" "),
                values.len()
            );
        }

        let parse = |idx: usize| -> Result<f64> {
            values[idx].parse::<f64>().with_context(|| {
                format!(
                    "Line {}: '{}' column is not a number",
                    lineno + 1,
                    TXT_COLUMNS[idx]
                )
            })
        };

        let id: i64 = values[1]
            .parse()
            .with_context(|| format!("Line {}: tile id is not an integer", lineno + 1))?;
        let field = Field::new(
            FieldId::new(id),
            parse(2)?,
            parse(3)?,
            ExposureParameters::default(),
        )?
        .with_weight(parse(4)?);
        fields.push(field);
    }

    Ok(fields)
}

/// Output path for a converted tile list: same stem, `.fields` extension
pub fn fields_path_for(path: &Path) -> PathBuf {
    path.with_extension("fields")
}
