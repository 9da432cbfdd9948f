//! Extraction of `:name` parameters from statement text.
//!
//! The engine scans the query once and rewrites every named parameter into
//! the placeholder form native to the backend. `::` casts and `:=`
//! assignments are emitted verbatim, as are single quoted literals
//! (including `\` escaped characters) and, for backends that support them,
//! double quoted identifiers.

/// Native placeholder form of a backend's SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `:name`, passed through as written. Used by backends which bind
    /// named parameters natively, e.g. SQLite.
    Named,
    /// `$1`, `$2`, … numbered per occurrence, e.g. PostgreSQL.
    Dollar,
    /// `?` anonymous markers, e.g. MySQL or ODBC based drivers.
    QuestionMark,
}

/// Result of scanning one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedQuery {
    /// Query text rewritten to the backend's native placeholder form.
    pub text: String,
    /// Name of every parameter occurrence, in textual order. Contains
    /// duplicates if a name is used more than once.
    pub occurrences: Vec<String>,
}

impl ParsedQuery {
    /// Distinct parameter names, in textual order of first occurrence.
    pub fn distinct_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for occurrence in &self.occurrences {
            if !names.contains(occurrence) {
                names.push(occurrence.clone());
            }
        }
        names
    }
}

#[derive(PartialEq)]
enum State {
    Normal,
    InQuotes,
    InIdentifier,
    InName,
}

pub(crate) fn parse_query(
    query: &str,
    style: PlaceholderStyle,
    quoted_identifiers: bool,
) -> ParsedQuery {
    let mut text = String::with_capacity(query.len());
    let mut occurrences = Vec::new();
    let mut name = String::new();
    let mut state = State::Normal;
    let mut escaped = false;

    let mut chars = query.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Normal => {
                if c == '\'' {
                    text.push(c);
                    state = State::InQuotes;
                    escaped = false;
                } else if c == '"' && quoted_identifiers {
                    text.push(c);
                    state = State::InIdentifier;
                } else if c == ':' {
                    // A cast (::) or an assignment (:=) is not a named
                    // binding and is emitted verbatim.
                    match chars.peek() {
                        Some(':') => {
                            text.push_str("::");
                            chars.next();
                        }
                        Some('=') => {
                            text.push_str(":=");
                            chars.next();
                        }
                        _ => state = State::InName,
                    }
                } else {
                    text.push(c);
                }
            }
            State::InQuotes => {
                text.push(c);
                if c == '\'' && !escaped {
                    state = State::Normal;
                }
                escaped = c == '\\' && !escaped;
            }
            State::InIdentifier => {
                text.push(c);
                if c == '"' {
                    state = State::Normal;
                }
            }
            State::InName => {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                } else {
                    emit_placeholder(&mut text, &mut occurrences, &mut name, style);
                    state = State::Normal;
                    // A parameter immediately followed by a cast, e.g.
                    // :name::float. Consume the second colon here so it is
                    // not misread as the start of another name.
                    if c == ':' {
                        text.push(':');
                        if chars.peek() == Some(&':') {
                            text.push(':');
                            chars.next();
                        }
                    } else {
                        text.push(c);
                    }
                }
            }
        }
    }

    if state == State::InName {
        emit_placeholder(&mut text, &mut occurrences, &mut name, style);
    }

    ParsedQuery { text, occurrences }
}

fn emit_placeholder(
    text: &mut String,
    occurrences: &mut Vec<String>,
    name: &mut String,
    style: PlaceholderStyle,
) {
    let name = std::mem::take(name);
    match style {
        PlaceholderStyle::Named => {
            text.push(':');
            text.push_str(&name);
        }
        PlaceholderStyle::Dollar => {
            text.push('$');
            text.push_str(&(occurrences.len() + 1).to_string());
        }
        PlaceholderStyle::QuestionMark => text.push('?'),
    }
    occurrences.push(name);
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn named_style_reconstructs_the_query() {
        let parsed = parse_query(
            "select v from t where a = :a and b = :b",
            PlaceholderStyle::Named,
            true,
        );
        assert_eq!("select v from t where a = :a and b = :b", parsed.text);
        assert_eq!(vec!["a", "b"], parsed.distinct_names());
    }

    #[test]
    fn cast_is_not_a_parameter() {
        let parsed = parse_query(
            "select :a::integer, :a::integer",
            PlaceholderStyle::Dollar,
            true,
        );
        assert_eq!("select $1::integer, $2::integer", parsed.text);
        assert_eq!(vec!["a", "a"], parsed.occurrences);
        assert_eq!(vec!["a"], parsed.distinct_names());
    }

    #[test]
    fn standalone_cast_is_emitted_verbatim() {
        let parsed = parse_query("select 23::float", PlaceholderStyle::Dollar, true);
        assert_eq!("select 23::float", parsed.text);
        assert!(parsed.occurrences.is_empty());
    }

    #[test]
    fn assignment_is_not_a_parameter() {
        let parsed = parse_query("set @x:=1", PlaceholderStyle::QuestionMark, false);
        assert_eq!("set @x:=1", parsed.text);
        assert!(parsed.occurrences.is_empty());
    }

    #[test]
    fn colons_inside_literals_are_ignored() {
        let parsed = parse_query(
            "select ':not_a_param' from t where v = :v",
            PlaceholderStyle::QuestionMark,
            true,
        );
        assert_eq!("select ':not_a_param' from t where v = ?", parsed.text);
        assert_eq!(vec!["v"], parsed.distinct_names());
    }

    #[test]
    fn escaped_quote_does_not_end_the_literal() {
        let parsed = parse_query(
            r"select 'it\'s :x' from t",
            PlaceholderStyle::QuestionMark,
            true,
        );
        assert_eq!(r"select 'it\'s :x' from t", parsed.text);
        assert!(parsed.occurrences.is_empty());
    }

    #[test]
    fn colons_inside_quoted_identifiers_are_ignored() {
        let parsed = parse_query(
            "select \":odd name\" from t",
            PlaceholderStyle::Dollar,
            true,
        );
        assert_eq!("select \":odd name\" from t", parsed.text);
        assert!(parsed.occurrences.is_empty());
    }

    #[test]
    fn quoted_identifiers_can_be_unsupported() {
        // Without identifier quoting the double quote is an ordinary
        // character and the colon inside starts a name.
        let parsed = parse_query("select \":v\" from t", PlaceholderStyle::QuestionMark, false);
        assert_eq!("select \"?\" from t", parsed.text);
        assert_eq!(vec!["v"], parsed.distinct_names());
    }

    #[test]
    fn name_at_end_of_query() {
        let parsed = parse_query("select * from t where v = :v", PlaceholderStyle::Dollar, true);
        assert_eq!("select * from t where v = $1", parsed.text);
        assert_eq!(vec!["v"], parsed.distinct_names());
    }

    #[test_case(PlaceholderStyle::Named, "insert into t(a, b) values(:a, :b)")]
    #[test_case(PlaceholderStyle::Dollar, "insert into t(a, b) values($1, $2)")]
    #[test_case(PlaceholderStyle::QuestionMark, "insert into t(a, b) values(?, ?)")]
    fn placeholder_styles(style: PlaceholderStyle, expected: &str) {
        let parsed = parse_query("insert into t(a, b) values(:a, :b)", style, true);
        assert_eq!(expected, parsed.text);
        assert_eq!(vec!["a", "b"], parsed.distinct_names());
    }

    /// Splicing the extracted names back into the rewritten text yields the
    /// original query.
    #[test]
    fn rewrite_is_reversible() {
        let original = "update t set a = :a, b = :b::int where c = ':c' and d = :a";
        let parsed = parse_query(original, PlaceholderStyle::QuestionMark, true);
        let mut reconstructed = String::new();
        let mut names = parsed.occurrences.iter();
        for c in parsed.text.chars() {
            if c == '?' {
                reconstructed.push(':');
                reconstructed.push_str(names.next().unwrap());
            } else {
                reconstructed.push(c);
            }
        }
        assert_eq!(original, reconstructed);
    }
}
