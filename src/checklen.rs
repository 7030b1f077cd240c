use anyhow::{bail, Context, Result};

///////////////////////////////
/// A per-file check-length selector with slice semantics: optional start,
/// stop and step, where negative indices count from the end and a negative
/// step walks backwards. A bare length `N` selects the first N characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSlice {
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
}

impl CheckSlice {
    /// Parse a comma-separated list such as `16,8`, `4:8,3` or `-5:3:-1`.
    /// `None` or an empty field leaves that bound open.
    pub fn parse_list(spec: &str) -> Result<Vec<CheckSlice>> {
        spec.split(',').map(CheckSlice::parse).collect()
    }

    fn parse(part: &str) -> Result<CheckSlice> {
        let fields: Vec<&str> = part.split(':').collect();
        if fields.len() > 3 {
            bail!("invalid check length '{}': too many ':' separators", part);
        }
        let parse_field = |field: &str| -> Result<Option<isize>> {
            if field.is_empty() || field == "None" {
                return Ok(None);
            }
            let value = field
                .parse()
                .with_context(|| format!("invalid check length '{}'", part))?;
            Ok(Some(value))
        };
        if fields.len() == 1 {
            // A bare length selects a prefix.
            return Ok(CheckSlice {
                start: None,
                stop: parse_field(fields[0])?,
                step: None,
            });
        }
        let slice = CheckSlice {
            start: parse_field(fields[0])?,
            stop: parse_field(fields[1])?,
            step: fields.get(2).copied().map_or(Ok(None), parse_field)?,
        };
        if slice.step == Some(0) {
            bail!("invalid check length '{}': slice step cannot be zero", part);
        }
        Ok(slice)
    }

    /// Select from `input` with out-of-range bounds clamped, the way string
    /// slicing behaves in scripting languages.
    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        let length = input.len() as isize;
        let step = self.step.unwrap_or(1);
        let adjust = |value: isize, low: isize, high: isize| -> isize {
            let value = if value < 0 { value + length } else { value };
            value.clamp(low, high)
        };
        let (start, stop) = if step > 0 {
            (
                self.start.map_or(0, |v| adjust(v, 0, length)),
                self.stop.map_or(length, |v| adjust(v, 0, length)),
            )
        } else {
            (
                self.start.map_or(length - 1, |v| adjust(v, -1, length - 1)),
                self.stop.map_or(-1, |v| adjust(v, -1, length - 1)),
            )
        };
        let mut selected = Vec::new();
        let mut index = start;
        while (step > 0 && index < stop) || (step < 0 && index > stop) {
            selected.push(input[index as usize]);
            index += step;
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> CheckSlice {
        CheckSlice { start, stop, step }
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            CheckSlice::parse_list("5,6,7").unwrap(),
            vec![
                slice(None, Some(5), None),
                slice(None, Some(6), None),
                slice(None, Some(7), None),
            ]
        );
        assert_eq!(
            CheckSlice::parse_list("5:8,3,-5:3:-1").unwrap(),
            vec![
                slice(Some(5), Some(8), None),
                slice(None, Some(3), None),
                slice(Some(-5), Some(3), Some(-1)),
            ]
        );
        assert_eq!(
            CheckSlice::parse_list("None:None:16").unwrap(),
            vec![slice(None, None, Some(16))]
        );
        assert_eq!(
            CheckSlice::parse_list("::16").unwrap(),
            vec![slice(None, None, Some(16))]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CheckSlice::parse_list("1:2:3:4").is_err());
        assert!(CheckSlice::parse_list("abc").is_err());
        assert!(CheckSlice::parse_list("1:2:0").is_err());
    }

    #[test]
    fn test_apply_prefix() {
        let input = b"ACGTACGT";
        assert_eq!(slice(None, Some(4), None).apply(input), b"ACGT");
        assert_eq!(slice(None, Some(100), None).apply(input), b"ACGTACGT");
        assert_eq!(slice(None, None, None).apply(input), b"ACGTACGT");
    }

    #[test]
    fn test_apply_ranges_and_steps() {
        let input = b"abcdefgh";
        assert_eq!(slice(Some(4), Some(8), None).apply(input), b"efgh");
        assert_eq!(slice(Some(-3), None, None).apply(input), b"fgh");
        assert_eq!(slice(None, None, Some(2)).apply(input), b"aceg");
        assert_eq!(slice(None, None, Some(16)).apply(input), b"a");
        assert_eq!(slice(None, None, Some(-1)).apply(input), b"hgfedcba");
        assert_eq!(slice(Some(-5), Some(3), Some(-1)).apply(input), b"");
        assert_eq!(slice(Some(6), Some(2), Some(-2)).apply(input), b"ge");
    }
}
