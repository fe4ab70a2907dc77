/// MARC language codes offered by the language filter, with display names.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("eng", "English"),
    ("fre", "French"),
    ("spa", "Spanish"),
    ("hin", "Hindi"),
    ("ger", "German"),
    ("ita", "Italian"),
    ("por", "Portuguese"),
    ("rus", "Russian"),
    ("jpn", "Japanese"),
    ("chi", "Chinese"),
    ("ara", "Arabic"),
    ("dut", "Dutch"),
];

pub fn display_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    LANGUAGES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(display_name("eng"), Some("English"));
        assert_eq!(display_name(" FRE "), Some("French"));
        assert_eq!(display_name("xyz"), None);
    }

    #[test]
    fn codes_are_unique() {
        let mut codes = LANGUAGES.iter().map(|(code, _)| *code).collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), LANGUAGES.len());
    }
}
