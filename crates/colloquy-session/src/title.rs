use colloquy_persist::DEFAULT_CONVERSATION_TITLE;

pub const TITLE_MAX_CHARS: usize = 40;
pub const TITLE_MAX_WORDS: usize = 4;
pub const PREVIEW_MAX_CHARS: usize = 60;
const ELLIPSIS: &str = "...";

/// Title for a conversation started by its first message: the first four
/// space-separated words of the first sentence, cut to 40 characters.
/// The ellipsis is appended whenever the whole message exceeds 40
/// characters, even if the cut title itself is shorter.
pub fn derive_title(text: &str) -> String {
    let first_sentence = text
        .split(|c: char| matches!(c, '.' | '!' | '?'))
        .next()
        .unwrap_or("");

    let words: Vec<&str> = first_sentence.split(' ').take(TITLE_MAX_WORDS).collect();
    let mut title: String = words.join(" ").trim().chars().take(TITLE_MAX_CHARS).collect();

    if title.is_empty() {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    }
    if text.chars().count() > TITLE_MAX_CHARS {
        title.push_str(ELLIPSIS);
    }
    title
}

/// Short form of a message for conversation listings
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_MAX_CHARS {
        let mut cut: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        text.to_string()
    }
}
