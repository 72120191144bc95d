//! Fixed-width numeric candidate rendering.

/// Render `n` as a decimal string left-padded with `0` to `width` characters.
///
/// # Examples
///
/// ```
/// use recovery::candidate::render;
///
/// assert_eq!(render(42, 8), "00000042");
/// assert_eq!(render(99_999_999, 8), "99999999");
/// ```
pub fn render(n: u64, width: u32) -> String {
    format!("{:0width$}", n, width = width as usize)
}

/// Parse a rendered candidate back into its number.
///
/// Returns `None` for anything that is not made purely of ASCII digits.
pub fn parse(candidate: &str) -> Option<u64> {
    if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    candidate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pads_to_width() {
        assert_eq!(render(0, 8), "00000000");
        assert_eq!(render(7, 8), "00000007");
        assert_eq!(render(42000, 8), "00042000");
        assert_eq!(render(5, 1), "5");
    }

    #[test]
    fn test_render_parse_whole_domain() {
        for width in 1..=3u32 {
            for n in 0..10u64.pow(width) {
                let candidate = render(n, width);
                assert_eq!(candidate.len(), width as usize);
                assert_eq!(parse(&candidate), Some(n));
            }
        }
    }

    #[test]
    fn test_render_widest() {
        let candidate = render(9_999_999_999_999_999_999, 19);
        assert_eq!(candidate.len(), 19);
        assert_eq!(parse(&candidate), Some(9_999_999_999_999_999_999));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("+12"), None);
        assert_eq!(parse("12a4"), None);
        assert_eq!(parse(" 123"), None);
    }
}
