use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::api::{ExposureParameters, Field, FieldId};

/// Column names written in the commented header of a `.fields` table.
pub const FIELDS_COLUMNS: &[&str] = &["id", "ra", "dec", "weight", "filt", "exposure_time", "count"];

const DEFAULT_FILTER: &str = "R";
const DEFAULT_EXPOSURE_TIME: f64 = 120.0;

/// Column positions resolved from the header line
struct ColumnMap {
    id: usize,
    ra: usize,
    dec: usize,
    weight: Option<usize>,
    filt: Option<usize>,
    exposure_time: Option<usize>,
    count: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.trim_start_matches('#').split_whitespace().collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        let require = |name: &str| {
            find(name).with_context(|| format!("Fields table header lacks '{}' column", name))
        };

        Ok(Self {
            id: require("id")?,
            ra: require("ra")?,
            dec: require("dec")?,
            weight: find("weight"),
            filt: find("filt"),
            exposure_time: find("exposure_time"),
            count: find("count"),
        })
    }
}

/// Parse a `.fields` table from a file
pub fn parse_fields_file(path: &Path) -> Result<Vec<Field>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fields table: {}", path.display()))?;

    parse_fields_str(&content)
        .with_context(|| format!("Failed to parse fields table: {}", path.display()))
}

/// Parse a `.fields` table from a string.
///
/// The first non-empty line is a commented header naming the columns; rows
/// are whitespace separated. Coordinates are validated like any other field
/// entering the bridge.
pub fn parse_fields_str(content: &str) -> Result<Vec<Field>> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    if !header.trim_start().starts_with('#') {
        bail!("Fields table must start with a commented header");
    }
    let columns = ColumnMap::from_header(header)?;

    let mut fields = Vec::new();
    for (lineno, line) in lines {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let values: Vec<&str> = line.split_whitespace().collect();
        let field = parse_row(&columns, &values)
            .with_context(|| format!("Invalid fields row at line {}", lineno + 1))?;
        fields.push(field);
    }

    Ok(fields)
}

fn parse_row(columns: &ColumnMap, values: &[&str]) -> Result<Field> {
    let get = |idx: usize| {
        values
            .get(idx)
            .copied()
            .with_context(|| format!("missing column {}", idx + 1))
    };
    let get_f64 = |idx: usize| -> Result<f64> {
        let raw = get(idx)?;
        raw.parse::<f64>()
            .with_context(|| format!("'{}' is not a number", raw))
    };

    let id: i64 = get(columns.id)?
        .parse()
        .context("field id is not an integer")?;
    let ra = get_f64(columns.ra)?;
    let dec = get_f64(columns.dec)?;
    let weight = columns.weight.map(get_f64).transpose()?.unwrap_or(0.0);
    let filter = columns
        .filt
        .map(get)
        .transpose()?
        .unwrap_or(DEFAULT_FILTER);
    let exposure_time = columns
        .exposure_time
        .map(get_f64)
        .transpose()?
        .unwrap_or(DEFAULT_EXPOSURE_TIME);
    let count = match columns.count {
        Some(idx) => get(idx)?.parse::<u32>().context("count is not an integer")?,
        None => 1,
    };

    let exposure = ExposureParameters::new(filter, exposure_time, count);
    Ok(Field::new(FieldId::new(id), ra, dec, exposure)?.with_weight(weight))
}

/// Render fields as a `.fields` table with a commented header.
pub fn write_fields_str(fields: &[Field]) -> String {
    let mut out = format!("# {}\n", FIELDS_COLUMNS.join(" "));
    for field in fields {
        out.push_str(&format!(
            "{} {} {} {} {} {} {}\n",
            field.id,
            field.ra.value(),
            field.dec.value(),
            field.weight,
            field.exposure.filter,
            field.exposure.exposure_time.value(),
            field.exposure.count
        ));
    }
    out
}
