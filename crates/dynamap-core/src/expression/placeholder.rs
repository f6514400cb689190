//! Placeholder tokens for attribute names and values.
//!
//! Every contributor (record translation, extensions, callers) derives tokens
//! for a real attribute name with [`key_ref`] and [`value_ref`], so the same
//! attribute always gets the same token and distinct attributes never share
//! one.

/// Prefix of generated name tokens.
pub const NAME_TOKEN_PREFIX: &str = "#AMZN_MAPPED_";

/// Prefix of generated value tokens.
pub const VALUE_TOKEN_PREFIX: &str = ":AMZN_MAPPED_";

/// Name token for an attribute: `#AMZN_MAPPED_<clean(name)>`.
#[must_use]
pub fn key_ref(name: &str) -> String {
    format!("{NAME_TOKEN_PREFIX}{}", clean(name))
}

/// Value token for an attribute: `:AMZN_MAPPED_<clean(name)>`.
#[must_use]
pub fn value_ref(name: &str) -> String {
    format!("{VALUE_TOKEN_PREFIX}{}", clean(name))
}

/// Make `name` usable inside a token.
///
/// Characters outside `[A-Za-z0-9_]` become `_`. If that changed anything, an
/// 8-hex-digit FNV-1a hash of the original name is appended so `a-b` and `a.b`
/// stay distinct.
#[must_use]
pub fn clean(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| if is_token_char(c) { c } else { '_' })
        .collect();
    if cleaned != name {
        cleaned.push('_');
        cleaned.push_str(&format!("{:08x}", fnv1a(name.as_bytes())));
    }
    cleaned
}

fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u32::from(*b)).wrapping_mul(PRIME))
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` for `#name` tokens.
#[must_use]
pub fn is_name_placeholder(token: &str) -> bool {
    token.len() > 1 && token.starts_with('#') && token[1..].chars().all(is_token_char)
}

/// Returns `true` for `:value` tokens.
#[must_use]
pub fn is_value_placeholder(token: &str) -> bool {
    token.len() > 1 && token.starts_with(':') && token[1..].chars().all(is_token_char)
}

/// A placeholder occurrence inside expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderToken<'a> {
    /// `#name`
    Name(&'a str),
    /// `:value`
    Value(&'a str),
}

impl<'a> PlaceholderToken<'a> {
    /// The token text including its sigil.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Name(t) | Self::Value(t) => t,
        }
    }
}

/// Scan expression text for placeholder tokens, in order of appearance.
#[must_use]
pub fn placeholder_tokens(text: &str) -> Vec<PlaceholderToken<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let sigil = bytes[pos];
        if sigil == b'#' || sigil == b':' {
            let start = pos;
            pos += 1;
            while pos < bytes.len() && is_token_char(char::from(bytes[pos])) {
                pos += 1;
            }
            if pos > start + 1 {
                let token = &text[start..pos];
                tokens.push(if sigil == b'#' {
                    PlaceholderToken::Name(token)
                } else {
                    PlaceholderToken::Value(token)
                });
            }
        } else {
            pos += 1;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_plain_tokens() {
        assert_eq!(key_ref("version"), "#AMZN_MAPPED_version");
        assert_eq!(value_ref("first_name"), ":AMZN_MAPPED_first_name");
    }

    #[test]
    fn test_should_keep_cleaned_names_distinct() {
        let dash = key_ref("a-b");
        let dot = key_ref("a.b");
        assert!(dash.starts_with("#AMZN_MAPPED_a_b_"));
        assert_ne!(dash, dot);
        assert_ne!(key_ref("a_b"), dash);
        assert_eq!(dash, key_ref("a-b"));
        assert!(is_name_placeholder(&dash));
    }

    #[test]
    fn test_should_scan_tokens_in_order() {
        let tokens = placeholder_tokens("#a = :a AND attribute_exists(#b.c[0]) OR size(#d) > :n_1");
        let texts: Vec<&str> = tokens.iter().map(PlaceholderToken::as_str).collect();
        assert_eq!(texts, vec!["#a", ":a", "#b", "#d", ":n_1"]);
        assert!(matches!(tokens[1], PlaceholderToken::Value(":a")));
    }

    #[test]
    fn test_should_classify_placeholders() {
        assert!(is_value_placeholder(":v1"));
        assert!(!is_value_placeholder(":"));
        assert!(!is_name_placeholder("name"));
    }
}
