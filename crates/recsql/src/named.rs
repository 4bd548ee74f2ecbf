//! `:name` placeholder binding.
//!
//! Insert templates use named placeholders (`VALUES (:id, :name)`), which
//! Postgres does not understand. [`compile`] rewrites them to positional
//! `$n` placeholders and reports the names in parameter order. A name used
//! twice binds to the same position. `::` casts and the contents of quoted
//! literals and identifiers are left alone.

/// SQL with positional placeholders plus the parameter names, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSql {
    pub sql: String,
    pub names: Vec<String>,
}

pub fn compile(sql: &str) -> NamedSql {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.push_str("::");
            }
            ':' if chars.peek().is_some_and(|c| is_name_start(*c)) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                let position = match names.iter().position(|n| *n == name) {
                    Some(i) => i + 1,
                    None => {
                        names.push(name);
                        names.len()
                    }
                };
                out.push('$');
                out.push_str(&position.to_string());
            }
            c => out.push(c),
        }
    }

    NamedSql { sql: out, names }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
