//! Known model metadata.

/// Context window used when a model is not in the table.
pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;

const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4", 8192),
    ("gpt-4-0613", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-32k-0613", 32768),
    ("gpt-4-1106-preview", 128000),
    ("gpt-4-turbo", 128000),
    ("gpt-4o", 128000),
    ("gpt-4o-mini", 128000),
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-0613", 4096),
    ("gpt-3.5-turbo-16k", 16385),
    ("gpt-3.5-turbo-1106", 16385),
];

/// Context window (in tokens) of a known model, if any.
pub fn context_window(model: &str) -> Option<usize> {
    CONTEXT_WINDOWS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, window)| *window)
}

/// Context window of `model`, or [`DEFAULT_CONTEXT_WINDOW`].
pub fn context_window_or_default(model: &str) -> usize {
    context_window(model).unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Rough token estimate: 1 token ≈ 4 chars.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_windows() {
        assert_eq!(context_window("gpt-4"), Some(8192));
        assert_eq!(context_window("gpt-4-1106-preview"), Some(128000));
        assert_eq!(context_window("gpt-3.5-turbo-16k"), Some(16385));
        assert_eq!(context_window("mistral-7b"), None);
        assert_eq!(context_window_or_default("mistral-7b"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
