//! Dialect-aware SQL identifier/string requoting (§4.6.1): rewrites whatever
//! mix of quote characters an agent emitted into the target dialect's
//! preferred identifier delimiter, while always normalizing string literals
//! to single quotes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dbadapter::Dialect;

struct Delimiters {
    identifier_open: char,
    identifier_close: char,
    uppercase_identifiers: bool,
}

fn delimiters_for(dialect: Dialect) -> Delimiters {
    match dialect {
        Dialect::Sqlite | Dialect::MySql | Dialect::MariaDb => {
            Delimiters { identifier_open: '`', identifier_close: '`', uppercase_identifiers: false }
        }
        Dialect::PostgreSql => Delimiters { identifier_open: '"', identifier_close: '"', uppercase_identifiers: false },
        Dialect::Oracle => Delimiters { identifier_open: '"', identifier_close: '"', uppercase_identifiers: true },
        Dialect::SqlServer => Delimiters { identifier_open: '[', identifier_close: ']', uppercase_identifiers: false },
    }
}

static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(?:[^'\\]|\\.)*'").unwrap());
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).unwrap());
static BACKTICK_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(?:[^`\\]|\\.)*`").unwrap());
static BRACKET_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(?:[^\]\\]|\\.)*\]").unwrap());

const STRING_INDICATORS: &[&str] = &["=", "!=", "<>", "<=", ">=", "<", ">", "IN", "LIKE", "ILIKE", "VALUES", "VALUE"];
const IDENTIFIER_INDICATORS: &[&str] =
    &["SELECT", "FROM", "UPDATE", "JOIN", "ORDER BY", "GROUP BY", "WHERE", "ON", "AS"];

const RESERVED_WORDS: &[&str] = &[
    "select", "from", "where", "order", "group", "having", "insert", "update", "delete", "create", "drop", "alter",
    "index", "table", "view", "procedure", "function", "trigger", "database", "schema", "union", "join", "inner",
    "outer", "left", "right", "cross", "exists", "in", "between", "like", "null", "not", "and", "or", "case", "when",
    "then", "else", "end", "distinct", "all", "user", "date", "time", "timestamp",
];

fn needs_delimiter(identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    if identifier.chars().any(|c| !(c.is_alphanumeric() || c == '_')) {
        return true;
    }
    if identifier.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return true;
    }
    RESERVED_WORDS.contains(&identifier.to_lowercase().as_str())
}

/// Inspects the text preceding a quoted segment to classify it as a string
/// literal (value) or an identifier (table/column name/alias).
fn is_string_context(sql: &str, start: usize) -> bool {
    let before = sql[..start].trim_end();
    if before.is_empty() {
        return false;
    }
    let upper = before.to_uppercase();

    for indicator in STRING_INDICATORS {
        if upper.ends_with(indicator) {
            return true;
        }
    }

    if before.ends_with(',') || before.ends_with('(') {
        let words: Vec<&str> = upper.split_whitespace().collect();
        if words.last() == Some(&"IN") || words.last() == Some(&"VALUES") {
            return true;
        }
        if words.len() >= 2 && (words[words.len() - 2] == "IN" || words[words.len() - 2] == "VALUES") {
            return true;
        }
    }

    for indicator in IDENTIFIER_INDICATORS {
        if upper.ends_with(indicator) {
            return false;
        }
    }

    false
}

enum Segment {
    String(String),
    Identifier(String),
}

/// Finds every quoted run (any of the four quote styles) and classifies it,
/// single-quoted runs always treated as strings since that's unambiguous.
fn extract_segments(sql: &str) -> Vec<(usize, usize, Segment)> {
    let mut found = Vec::new();

    for m in SINGLE_QUOTED.find_iter(sql) {
        let inner = &m.as_str()[1..m.as_str().len() - 1];
        found.push((m.start(), m.end(), Segment::String(inner.to_string())));
    }

    for regex in [&*DOUBLE_QUOTED, &*BACKTICK_QUOTED, &*BRACKET_QUOTED] {
        for m in regex.find_iter(sql) {
            if found.iter().any(|(s, e, _)| m.start() < *e && *s < m.end()) {
                continue;
            }
            let inner = &m.as_str()[1..m.as_str().len() - 1];
            let segment = if is_string_context(sql, m.start()) {
                Segment::String(inner.to_string())
            } else {
                Segment::Identifier(inner.to_string())
            };
            found.push((m.start(), m.end(), segment));
        }
    }

    found.sort_by_key(|(start, _, _)| *start);
    found
}

/// Rewrites every quoted segment in `sql` to the delimiter convention of
/// `dialect`: strings become single-quoted with `'` doubled, identifiers
/// become the dialect's bracket/quote style (or unquoted, if they don't
/// need delimiting), and Oracle identifiers are upper-cased.
pub fn correct_sql_delimiters(sql: &str, dialect: Dialect) -> String {
    if sql.trim().is_empty() {
        return sql.to_string();
    }

    let delimiters = delimiters_for(dialect);
    let segments = extract_segments(sql);

    let mut result = String::with_capacity(sql.len());
    let mut cursor = 0;
    for (start, end, segment) in segments {
        result.push_str(&sql[cursor..start]);
        match segment {
            Segment::String(inner) => {
                result.push('\'');
                result.push_str(&inner.replace('\'', "''"));
                result.push('\'');
            }
            Segment::Identifier(inner) => {
                if needs_delimiter(&inner) {
                    let rendered = if delimiters.uppercase_identifiers { inner.to_uppercase() } else { inner };
                    result.push(delimiters.identifier_open);
                    result.push_str(&rendered);
                    result.push(delimiters.identifier_close);
                } else {
                    result.push_str(&inner);
                }
            }
        }
        cursor = end;
    }
    result.push_str(&sql[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_uses_backticks_for_identifiers_needing_them_and_single_quotes_for_strings() {
        let sql = r#"SELECT "field name" FROM "my table" WHERE "status" = "active""#;
        let corrected = correct_sql_delimiters(sql, Dialect::Sqlite);
        assert_eq!(corrected, "SELECT `field name` FROM `my table` WHERE status = 'active'");
    }

    #[test]
    fn sqlserver_uses_square_brackets() {
        let sql = r#"SELECT "field name" FROM "my table" WHERE "status" = "active""#;
        let corrected = correct_sql_delimiters(sql, Dialect::SqlServer);
        assert_eq!(corrected, "SELECT [field name] FROM [my table] WHERE status = 'active'");
    }

    #[test]
    fn simple_identifiers_are_left_unquoted() {
        let sql = r#"SELECT name, count FROM users WHERE status = "active""#;
        let corrected = correct_sql_delimiters(sql, Dialect::PostgreSql);
        assert_eq!(corrected, "SELECT name, count FROM users WHERE status = 'active'");
    }

    #[test]
    fn oracle_uppercases_quoted_identifiers() {
        let sql = r#"SELECT "field name" FROM "my table""#;
        let corrected = correct_sql_delimiters(sql, Dialect::Oracle);
        assert_eq!(corrected, r#"SELECT "FIELD NAME" FROM "MY TABLE""#);
    }

    #[test]
    fn reserved_word_identifier_is_quoted_but_plain_names_are_not() {
        let sql = r#"SELECT "field-name" FROM "my_table" WHERE "count" > "5""#;
        let corrected = correct_sql_delimiters(sql, Dialect::MySql);
        assert_eq!(corrected, "SELECT `field-name` FROM my_table WHERE `count` > '5'");
    }

    #[test]
    fn single_quoted_content_is_preserved_and_escaped() {
        let sql = "SELECT * FROM t WHERE name = 'O''Brien'";
        let corrected = correct_sql_delimiters(sql, Dialect::Sqlite);
        assert_eq!(corrected, "SELECT * FROM t WHERE name = 'O''Brien'");
    }
}
