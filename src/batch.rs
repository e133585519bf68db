//! CSV Batch Pipeline
//!
//! Decodes an uploaded CSV into texts and encodes a scored batch back to CSV.
//! The whole file is rejected on the first malformed row.

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::models::BatchResult;
use crate::{AppError, AppResult};

pub const TEXT_COLUMN: &str = "text";

const OUTPUT_HEADER: [&str; 4] = ["text", "label", "probability", "threshold"];

/// Extract the `text` column, one entry per data row, in file order
pub fn parse(raw: &[u8]) -> AppResult<Vec<String>> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(raw);

    let column = reader
        .headers()?
        .iter()
        .position(|h| h == TEXT_COLUMN)
        .ok_or_else(|| AppError::FormatError(format!("CSV must contain a '{}' column", TEXT_COLUMN)))?;

    let mut texts = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let value = record.get(column).ok_or_else(|| {
            AppError::FormatError(format!("row {} is missing the '{}' column", i + 1, TEXT_COLUMN))
        })?;
        texts.push(value.to_string());
    }

    Ok(texts)
}

/// Serialize predictions with a fixed header, probability to 4 decimals
pub fn render(result: &BatchResult) -> AppResult<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(OUTPUT_HEADER)?;

    for item in &result.predictions {
        let probability = format!("{:.4}", item.probability);
        let threshold = item.threshold.to_string();
        writer.write_record([
            item.text.as_str(),
            item.label.as_str(),
            probability.as_str(),
            threshold.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV flush failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::tests::stub_predictor;

    #[test]
    fn test_parse_reads_text_column_in_order() {
        let csv = b"id,text\n1,Hello world\n2,\"You are a bad actor!\"\n";
        let texts = parse(csv).unwrap();
        assert_eq!(texts, vec!["Hello world", "You are a bad actor!"]);
    }

    #[test]
    fn test_parse_tolerates_bom_and_padded_header() {
        let csv = b"\xEF\xBB\xBF text \nfirst\n";
        assert_eq!(parse(csv).unwrap(), vec!["first"]);
    }

    #[test]
    fn test_missing_text_column_rejected() {
        let err = parse(b"message\nhello\n").unwrap_err();
        assert!(matches!(err, AppError::FormatError(msg) if msg.contains("'text'")));
    }

    #[test]
    fn test_short_row_rejects_whole_file() {
        let err = parse(b"id,text\n1,fine\n2\n3,also fine\n").unwrap_err();
        assert!(matches!(err, AppError::FormatError(msg) if msg.contains("row 2")));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = parse(b"text\n\xFF\xFE\n").unwrap_err();
        assert!(matches!(err, AppError::FormatError(_)));
    }

    #[test]
    fn test_parse_predict_render() {
        let (predictor, _) = stub_predictor();
        let input = b"text\nHello world\nYou are a bad actor!\n";

        let texts = parse(input).unwrap();
        let result = predictor.predict(texts).unwrap();
        let output = String::from_utf8(render(&result).unwrap()).unwrap();

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["text", "label", "probability", "threshold"]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "Hello world");
        assert_eq!(&rows[1][0], "You are a bad actor!");
        assert_eq!(&rows[0][1], "BENIGN");
        assert_eq!(&rows[1][1], "MALICIOUS");
        for row in &rows {
            assert!(matches!(&row[1], "MALICIOUS" | "BENIGN"));
            let (_, decimals) = row[2].split_once('.').unwrap();
            assert_eq!(decimals.len(), 4);
        }
        assert_eq!(&rows[1][2], "0.9000");
    }

    #[test]
    fn test_render_quotes_embedded_commas() {
        let (predictor, _) = stub_predictor();
        let result = predictor.predict(vec!["one, two".to_string()]).unwrap();
        let output = String::from_utf8(render(&result).unwrap()).unwrap();
        assert!(output.lines().nth(1).unwrap().starts_with("\"one, two\","));
    }
}
