//! Quote-aware splitting of command lines.
//!
//! Tokens are separated by whitespace. A token starting with `"` runs to the
//! next unescaped `"`; inside it `\"` stands for a literal quote and `\\` for
//! a literal backslash. An explicit
//! `""` yields an empty token, which callers treat as "no value".

/// Split the next token off `input`.
///
/// Returns the token and the text following it (not trimmed), or `None` when
/// only whitespace remains. An unterminated quote takes the rest of the input.
pub fn next_token(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }

    if let Some(quoted) = input.strip_prefix('"') {
        let mut token = String::new();
        let mut chars = quoted.char_indices();
        while let Some((idx, ch)) = chars.next() {
            match ch {
                '\\' if quoted[idx + 1..].starts_with(['"', '\\']) => {
                    if let Some((_, escaped)) = chars.next() {
                        token.push(escaped);
                    }
                }
                '"' => return Some((token, &quoted[idx + 1..])),
                other => token.push(other),
            }
        }
        return Some((token, ""));
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((input[..end].to_string(), &input[end..]))
}

/// Split a whole line into tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line;
    while let Some((token, tail)) = next_token(rest) {
        tokens.push(token);
        rest = tail;
    }
    tokens
}

/// Join tokens back into a line that [`tokenize`] splits the same way.
///
/// Tokens that are empty or contain whitespace, quotes or backslashes are
/// quoted, with `"` and `\` escaped.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let quoted: Vec<String> = tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            if !token.is_empty()
                && !token.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\')
            {
                token.to_string()
            } else {
                format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\""))
            }
        })
        .collect();
    quoted.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_runs_of_whitespace() {
        assert_eq!(tokenize("  vexec  Obj1\tSetSpeed 42 "), ["vexec", "Obj1", "SetSpeed", "42"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn quoted_tokens_keep_spaces_and_escapes() {
        assert_eq!(
            tokenize(r#"vbp Obj1 Say "hello world" "a \"quoted\" word""#),
            ["vbp", "Obj1", "Say", "hello world", r#"a "quoted" word"#]
        );
    }

    #[test]
    fn empty_quotes_yield_empty_token() {
        assert_eq!(tokenize(r#"f "" x"#), ["f", "", "x"]);
    }

    #[test]
    fn unterminated_quote_takes_rest() {
        assert_eq!(tokenize(r#"say "open ended"#), ["say", "open ended"]);
    }

    #[test]
    fn next_token_returns_untrimmed_tail() {
        let (token, rest) = next_token("cheat giveall weapons").unwrap();
        assert_eq!(token, "cheat");
        assert_eq!(rest, " giveall weapons");
        assert!(next_token(" \t").is_none());
    }

    #[test]
    fn join_quotes_only_when_needed() {
        let tokens = ["SetName", "two words", "", r#"say "hi""#, "plain"];
        let line = join_tokens(&tokens);
        assert_eq!(line, r#"SetName "two words" "" "say \"hi\"" plain"#);
        assert_eq!(tokenize(&line), tokens);
    }

    #[test]
    fn join_escapes_backslashes() {
        let tokens = [r"a b\", r"C:\dir", r#"x\"y"#];
        let line = join_tokens(&tokens);
        assert_eq!(line, r#""a b\\" "C:\\dir" "x\\\"y""#);
        assert_eq!(tokenize(&line), tokens);
    }

    #[test]
    fn quoted_backslash_escape() {
        assert_eq!(tokenize(r#""a\\b" "c\d""#), [r"a\b", r"c\d"]);
    }
}
