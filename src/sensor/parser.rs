use crate::types::Sample;

/// 串口行解析错误
/// 格式错误的行是在线数据里预期会出现的噪声，调用方记录后直接丢弃
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected 3 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid numeric field '{field}': {source}")]
    InvalidNumber {
        field: String,
        source: std::num::ParseFloatError,
    },
}

/// 将一行串口文本解析为一个三轴样本
/// 行格式: `x,y,z`，三个字段都必须是十进制数，全部解析成功才返回样本
pub fn parse_sample_line(line: &str) -> Result<Sample, ParseError> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() != 3 {
        return Err(ParseError::FieldCount(parts.len()));
    }

    let mut values = [0.0f64; 3];
    for (slot, part) in values.iter_mut().zip(parts.iter()) {
        let field = part.trim();
        *slot = field.parse().map_err(|source| ParseError::InvalidNumber {
            field: field.to_string(),
            source,
        })?;
    }

    Ok(Sample::new(values[0], values[1], values[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_line() {
        let sample = parse_sample_line("0.0123,-0.9981,0.0765").unwrap();
        assert_eq!(sample, Sample::new(0.0123, -0.9981, 0.0765));
    }

    #[test]
    fn parses_line_with_whitespace_and_newline() {
        let sample = parse_sample_line("  1.0 , -2.5 , 0.25 \r\n").unwrap();
        assert_eq!(sample, Sample::new(1.0, -2.5, 0.25));
    }

    #[test]
    fn parses_integers_and_signed_values() {
        let sample = parse_sample_line("+1,-2,3").unwrap();
        assert_eq!(sample, Sample::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn round_trips_through_fixed_precision_formatting() {
        let sample = parse_sample_line("0.0123,-0.9981,0.0765").unwrap();
        assert_eq!(format!("{:.4}", sample.x), "0.0123");
        assert_eq!(format!("{:.4}", sample.y), "-0.9981");
        assert_eq!(format!("{:.4}", sample.z), "0.0765");
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            parse_sample_line("1.0,2.0"),
            Err(ParseError::FieldCount(2))
        ));
        assert!(matches!(
            parse_sample_line("1.0,2.0,3.0,4.0"),
            Err(ParseError::FieldCount(4))
        ));
    }

    #[test]
    fn rejects_empty_line() {
        assert!(matches!(
            parse_sample_line(""),
            Err(ParseError::FieldCount(1))
        ));
        assert!(matches!(
            parse_sample_line("\n"),
            Err(ParseError::FieldCount(1))
        ));
    }

    #[test]
    fn rejects_non_numeric_field() {
        assert!(matches!(
            parse_sample_line("1.0,abc,3.0"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }
}
