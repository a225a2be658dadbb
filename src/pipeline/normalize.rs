//! Text normalisation: remove blank-line artefacts left by PDF and OCR extraction.

/// Collapse doubled newlines and trim surrounding whitespace.
///
/// The replacement is a single left-to-right pass: `"\n\n"` becomes `"\n"`,
/// so a run of three newlines shrinks to two, not one. Callers that need a
/// fixed point can apply the function again; the output is stable once it
/// contains no `"\n\n"`.
pub fn normalize(text: &str) -> String {
    text.replace("\n\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_double_newlines() {
        assert_eq!(normalize("Name: John\n\nDOB: 1990"), "Name: John\nDOB: 1990");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize("  \n hello \n\t"), "hello");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\n\n\n"), "");
    }

    #[test]
    fn single_pass_leaves_one_blank_line_from_triple() {
        assert_eq!(normalize("a\n\n\nb"), "a\n\nb");
        assert_eq!(normalize(&normalize("a\n\n\nb")), "a\nb");
    }

    #[test]
    fn four_newlines_become_two() {
        assert_eq!(normalize("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn text_without_blank_lines_is_unchanged() {
        let s = "line one\nline two";
        assert_eq!(normalize(s), s);
        assert_eq!(normalize(&normalize(s)), s);
    }
}
