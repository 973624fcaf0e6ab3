use regex::Regex;
use reviewgen_core::BackendError;
use std::sync::OnceLock;

fn think_tags() -> &'static Regex {
    static THINK: OnceLock<Regex> = OnceLock::new();
    THINK.get_or_init(|| {
        // (?is) makes the regex case-insensitive and `.` also matches newlines
        Regex::new(r"(?is)<think[^>]*?>.*?</think[^>]*?>").expect("valid think-tag regex")
    })
}

/// Strips `<think>...</think>` reasoning blocks some local models emit.
pub fn remove_think_tags(input: &str) -> String {
    think_tags().replace_all(input, "").to_string()
}

/// Cleans a raw model answer and rejects it when nothing usable is left.
pub fn require_text(raw: &str) -> Result<String, BackendError> {
    let cleaned = remove_think_tags(raw).trim().to_string();
    if cleaned.is_empty() {
        Err(BackendError::error("empty completion"))
    } else {
        Ok(cleaned)
    }
}

#[test]
fn test_remove_think_tags() {
    let cases = vec![
        ("<think>ok this is it</think>hello", "hello"),
        ("<thinking>this works too</think>hello", "hello"),
        (
            "<thinkAWDWADAWWAD>\nwadwa\nawdwadaw\nawdaw</think>hello",
            "hello",
        ),
    ];

    for (input, expected) in cases {
        assert_eq!(remove_think_tags(input), expected);
    }
}

#[test]
fn test_require_text_rejects_blank_answers() {
    assert!(require_text("   \n").is_err());
    assert!(require_text("<think>only reasoning</think>  ").is_err());
    assert_eq!(require_text("  review body \n").unwrap(), "review body");
}
