//! Line parsing: turns one raw input line into the stages of a pipeline.
//!
//! The parser never fails. Malformed input (an unterminated quote, a trailing
//! backslash, an empty stage between two `|`) is absorbed on a best-effort
//! basis rather than rejected.

use tracing::warn;

/// The stream a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Standard output: `>`, `>>`, `1>`, `1>>`.
    Output,
    /// Standard error: `2>`, `2>>`.
    Error,
    /// Any other descriptor number (`3>`...). Parsed, then ignored when executing.
    Unknown,
}

/// A request to send one of a stage's streams to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub target: RedirectTarget,
    pub path: String,
    /// `>>` appends, `>` truncates.
    pub append: bool,
}

/// One command of a pipeline with its arguments and redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    /// Program name followed by its arguments. Never empty for parsed stages.
    pub arguments: Vec<String>,
    /// Redirections in the order they appeared on the line.
    pub redirections: Vec<Redirection>,
}

impl Stage {
    /// The program name, `arguments[0]`.
    pub fn program(&self) -> &str {
        self.arguments.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

/// A word read from the line. `quoted` is set when any part of it came from
/// quotes or a backslash escape, which keeps `'2'>` from being read as `2>`.
#[derive(Debug, Default)]
struct Word {
    text: String,
    quoted: bool,
}

struct LineParser {
    input: Vec<char>,
    pos: usize,
    arguments: Vec<String>,
    redirections: Vec<Redirection>,
    stages: Vec<Stage>,
}

impl LineParser {
    fn new(line: &str) -> Self {
        LineParser {
            input: line.chars().collect(),
            pos: 0,
            arguments: Vec::new(),
            redirections: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn parse(mut self) -> Vec<Stage> {
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None => break,
                Some('|') => {
                    self.read_char();
                    self.finish_stage();
                }
                Some('>') => self.parse_redirection(RedirectTarget::Output),
                Some(_) => {
                    let word = self.read_word();
                    if self.peek_char() == Some('>') {
                        if let Some(target) = Self::descriptor_prefix(&word) {
                            self.parse_redirection(target);
                            continue;
                        }
                    }
                    if !word.text.is_empty() {
                        self.arguments.push(word.text);
                    }
                }
            }
        }
        self.finish_stage();
        self.stages
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(is_blank) {
            self.pos += 1;
        }
    }

    /// Reads one word, honoring quotes and escapes. Stops before unquoted
    /// whitespace, `|` or `>` without consuming it.
    fn read_word(&mut self) -> Word {
        let mut word = Word::default();
        let mut state = WordState::Unquoted;

        while let Some(ch) = self.peek_char() {
            if state == WordState::Unquoted && is_word_boundary(ch) {
                break;
            }
            self.pos += 1;
            state = match state {
                WordState::Unquoted => self.handle_unquoted(ch, &mut word),
                WordState::SingleQuoted => Self::handle_single_quote(ch, &mut word),
                WordState::DoubleQuoted => self.handle_double_quote(ch, &mut word),
            };
        }

        word
    }

    fn handle_unquoted(&mut self, ch: char, word: &mut Word) -> WordState {
        match ch {
            '\'' => {
                word.quoted = true;
                WordState::SingleQuoted
            }
            '"' => {
                word.quoted = true;
                WordState::DoubleQuoted
            }
            '\\' => {
                word.quoted = true;
                // A trailing backslash escapes nothing.
                if let Some(next) = self.read_char() {
                    word.text.push(next);
                }
                WordState::Unquoted
            }
            c => {
                word.text.push(c);
                WordState::Unquoted
            }
        }
    }

    fn handle_single_quote(ch: char, word: &mut Word) -> WordState {
        match ch {
            '\'' => WordState::Unquoted,
            c => {
                word.text.push(c);
                WordState::SingleQuoted
            }
        }
    }

    fn handle_double_quote(&mut self, ch: char, word: &mut Word) -> WordState {
        match ch {
            '"' => WordState::Unquoted,
            '\\' => {
                match self.peek_char() {
                    Some(next @ ('\\' | '"')) => {
                        self.pos += 1;
                        word.text.push(next);
                    }
                    _ => word.text.push('\\'),
                }
                WordState::DoubleQuoted
            }
            c => {
                word.text.push(c);
                WordState::DoubleQuoted
            }
        }
    }

    /// `1>` and `2>` pick a stream; any other lone digit picks an unknown one.
    fn descriptor_prefix(word: &Word) -> Option<RedirectTarget> {
        if word.quoted {
            return None;
        }
        let mut chars = word.text.chars();
        match (chars.next(), chars.next()) {
            (Some('1'), None) => Some(RedirectTarget::Output),
            (Some('2'), None) => Some(RedirectTarget::Error),
            (Some(c), None) if c.is_ascii_digit() => Some(RedirectTarget::Unknown),
            _ => None,
        }
    }

    /// Consumes `>` or `>>` and the path word that follows it.
    fn parse_redirection(&mut self, target: RedirectTarget) {
        self.read_char();
        let append = self.peek_char() == Some('>');
        if append {
            self.read_char();
        }

        self.skip_whitespace();
        let path = match self.peek_char() {
            Some(c) if !is_word_boundary(c) => self.read_word().text,
            _ => String::new(),
        };
        if path.is_empty() {
            warn!(?target, "redirection without a file name ignored");
            return;
        }

        self.redirections.push(Redirection {
            target,
            path,
            append,
        });
    }

    fn finish_stage(&mut self) {
        let arguments = std::mem::take(&mut self.arguments);
        let redirections = std::mem::take(&mut self.redirections);
        if arguments.is_empty() {
            if !redirections.is_empty() {
                warn!("redirections without a command ignored");
            }
            return;
        }
        self.stages.push(Stage {
            arguments,
            redirections,
        });
    }
}

fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_word_boundary(ch: char) -> bool {
    is_blank(ch) || ch == '|' || ch == '>'
}

/// Splits a line into pipeline stages.
///
/// Stages come back in pipe order; within a stage, arguments and
/// redirections keep the order they were written in.
pub fn parse(line: &str) -> Vec<Stage> {
    LineParser::new(line).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(stage: &Stage) -> Vec<&str> {
        stage.arguments.iter().map(String::as_str).collect()
    }

    fn single(line: &str) -> Stage {
        let mut stages = parse(line);
        assert_eq!(stages.len(), 1, "expected one stage for {line:?}");
        stages.remove(0)
    }

    #[test]
    fn test_quotes_and_escapes() {
        let stage = single(r#"echo 'a  b' "c\"d" e\ f"#);
        assert_eq!(args(&stage), vec!["echo", "a  b", "c\"d", "e f"]);
        assert!(stage.redirections.is_empty());
    }

    #[test]
    fn test_whitespace_runs_are_one_separator() {
        let stage = single("  ls \t  -l    /tmp  ");
        assert_eq!(args(&stage), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_single_quotes_keep_backslashes() {
        let stage = single(r"echo 'a\nb' 'x\'");
        assert_eq!(args(&stage), vec!["echo", r"a\nb", r"x\"]);
    }

    #[test]
    fn test_double_quote_backslash_only_escapes_quote_and_backslash() {
        let stage = single(r#"echo "a\\b" "a\nb" "a\$b""#);
        assert_eq!(args(&stage), vec!["echo", r"a\b", r"a\nb", r"a\$b"]);
    }

    #[test]
    fn test_adjacent_quoted_parts_join() {
        let stage = single(r#"echo 'foo'"bar"baz"#);
        assert_eq!(args(&stage), vec!["echo", "foobarbaz"]);
    }

    #[test]
    fn test_unterminated_quote_absorbs_rest_of_line() {
        let stage = single("echo 'abc def");
        assert_eq!(args(&stage), vec!["echo", "abc def"]);

        let stage = single("echo \"abc | def");
        assert_eq!(args(&stage), vec!["echo", "abc | def"]);
    }

    #[test]
    fn test_trailing_backslash_is_dropped() {
        let stage = single(r"echo abc\");
        assert_eq!(args(&stage), vec!["echo", "abc"]);
    }

    #[test]
    fn test_empty_quotes_do_not_make_an_argument() {
        let stage = single("echo '' \"\"");
        assert_eq!(args(&stage), vec!["echo"]);
    }

    #[test]
    fn test_output_redirection_truncate_and_append() {
        let stage = single("echo hi > out.txt");
        assert_eq!(args(&stage), vec!["echo", "hi"]);
        assert_eq!(
            stage.redirections,
            vec![Redirection {
                target: RedirectTarget::Output,
                path: "out.txt".to_string(),
                append: false,
            }]
        );

        let stage = single("echo hi >>out.txt");
        assert_eq!(args(&stage), vec!["echo", "hi"]);
        assert_eq!(stage.redirections[0].target, RedirectTarget::Output);
        assert!(stage.redirections[0].append);
    }

    #[test]
    fn test_descriptor_prefixes() {
        let stage = single("cmd 1>out 2>err 2>>log 7>other");
        assert_eq!(args(&stage), vec!["cmd"]);
        let targets: Vec<_> = stage
            .redirections
            .iter()
            .map(|r| (r.target, r.path.as_str(), r.append))
            .collect();
        assert_eq!(
            targets,
            vec![
                (RedirectTarget::Output, "out", false),
                (RedirectTarget::Error, "err", false),
                (RedirectTarget::Error, "log", true),
                (RedirectTarget::Unknown, "other", false),
            ]
        );
    }

    #[test]
    fn test_digit_separated_by_space_is_an_argument() {
        let stage = single("echo 2 > out");
        assert_eq!(args(&stage), vec!["echo", "2"]);
        assert_eq!(stage.redirections[0].target, RedirectTarget::Output);
    }

    #[test]
    fn test_quoted_digit_is_an_argument() {
        let stage = single("echo '2'>out");
        assert_eq!(args(&stage), vec!["echo", "2"]);
        assert_eq!(stage.redirections[0].target, RedirectTarget::Output);
    }

    #[test]
    fn test_word_glued_to_operator_stays_an_argument() {
        let stage = single("echo abc>out");
        assert_eq!(args(&stage), vec!["echo", "abc"]);
        assert_eq!(stage.redirections[0].path, "out");
    }

    #[test]
    fn test_redirection_path_honors_quotes() {
        let stage = single(r#"echo hi > "my file.txt" tail"#);
        assert_eq!(args(&stage), vec!["echo", "hi", "tail"]);
        assert_eq!(stage.redirections[0].path, "my file.txt");
    }

    #[test]
    fn test_redirection_without_path_is_dropped() {
        let stage = single("echo hi >");
        assert_eq!(args(&stage), vec!["echo", "hi"]);
        assert!(stage.redirections.is_empty());
    }

    #[test]
    fn test_every_redirection_is_kept_in_order() {
        let stage = single("echo a > first > second");
        let paths: Vec<_> = stage.redirections.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["first", "second"]);
    }

    #[test]
    fn test_pipeline_stages() {
        let stages = parse("printf 'b\\na\\nc' | sort|uniq -c 2>err");
        assert_eq!(stages.len(), 3);
        assert_eq!(args(&stages[0]), vec!["printf", "b\\na\\nc"]);
        assert_eq!(args(&stages[1]), vec!["sort"]);
        assert_eq!(args(&stages[2]), vec!["uniq", "-c"]);
        assert_eq!(stages[2].redirections[0].target, RedirectTarget::Error);
    }

    #[test]
    fn test_quoted_pipe_is_literal() {
        let stage = single("echo 'a|b' a\\|b");
        assert_eq!(args(&stage), vec!["echo", "a|b", "a|b"]);
    }

    #[test]
    fn test_empty_stages_are_dropped() {
        let stages = parse("ls | | wc");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].program(), "ls");
        assert_eq!(stages[1].program(), "wc");

        assert!(parse("|").is_empty());
        assert!(parse("   ").is_empty());
        assert!(parse("").is_empty());
    }
}
