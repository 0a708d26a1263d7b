#[cfg(test)]
mod tests {
    use crate::api::{ExposureParameters, Field, FieldId};
    use crate::parsing::fields_parser::{parse_fields_file, parse_fields_str, write_fields_str};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_table() {
        let content = "# id ra dec weight filt exposure_time count\n\
                       101 10.5 -20.25 0.3 B 60 2\n\
                       102 200 45 0.1 R 120 1\n";
        let fields = parse_fields_str(content).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].id, FieldId::new(101));
        assert_eq!(fields[0].ra.value(), 10.5);
        assert_eq!(fields[0].dec.value(), -20.25);
        assert_eq!(fields[0].weight, 0.3);
        assert_eq!(fields[0].exposure.filter, "B");
        assert_eq!(fields[0].exposure.exposure_time.value(), 60.0);
        assert_eq!(fields[0].exposure.count, 2);
    }

    /// Tables written by older tools have no count column and may reorder columns
    #[test]
    fn test_parse_by_column_name() {
        let content = "# ra dec id weight filt exposure_time\n10 20 7 0.5 R 90\n";
        let fields = parse_fields_str(content).unwrap();
        assert_eq!(fields[0].id, FieldId::new(7));
        assert_eq!(fields[0].ra.value(), 10.0);
        assert_eq!(fields[0].exposure.count, 1);
        assert_eq!(fields[0].exposure.exposure_time.value(), 90.0);
    }

    #[test]
    fn test_parse_rejects_invalid_rows() {
        assert!(parse_fields_str("# id ra dec\n1 400 0\n").is_err());
        assert!(parse_fields_str("# id ra dec\n1 abc 0\n").is_err());
        assert!(parse_fields_str("# id dec\n1 0\n").is_err());
        assert!(parse_fields_str("id ra dec\n1 0 0\n").is_err());
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_fields_str("").unwrap().is_empty());
        assert!(parse_fields_str("# id ra dec\n").unwrap().is_empty());
    }

    #[test]
    fn test_written_table_reads_back() {
        let fields = vec![
            Field::new(FieldId::new(1), 12.25, -3.5, ExposureParameters::new("I", 30.0, 3))
                .unwrap()
                .with_weight(0.75),
        ];
        let text = write_fields_str(&fields);
        assert!(text.starts_with("# id ra dec weight filt exposure_time count\n"));
        assert_eq!(parse_fields_str(&text).unwrap(), fields);
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "# id ra dec weight\n5 1 2 0.5\n").unwrap();
        let fields = parse_fields_file(file.path()).unwrap();
        assert_eq!(fields[0].exposure.filter, "R");
        assert_eq!(fields[0].exposure.exposure_time.value(), 120.0);
    }
}
