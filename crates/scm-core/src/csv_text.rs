//! CSV tokenizer for sheet exports.
//!
//! Converts raw text into rows of string fields. Fields are **not** trimmed
//! here; header lookup and cell access in [`crate::Sheet`] trim.
//!
//! Quoting policy:
//! - a `"` opens a quoted section only as the first character of a field;
//!   anywhere else it is a literal character;
//! - inside a quoted section `""` is one literal `"`, and commas / line
//!   breaks are field content;
//! - characters after a closing quote, up to the next delimiter, are
//!   appended literally;
//! - an opening quote still unclosed at end of input is re-read as a literal
//!   `"` and everything after it is tokenized as unquoted text.
//!
//! Line breaks are CRLF, LF or a lone CR. A leading UTF-8 BOM is skipped.
//! Rows that consist of a single blank field are dropped; every other row is
//! kept as-is, including short ones.

/// State captured when a quoted section opens, so an unterminated quote can
/// be rewound and re-read literally.
struct QuoteOpen {
    pos: usize,
    rows_len: usize,
    row: Vec<String>,
}

#[derive(Default)]
struct Tokenizer {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    field: String,
    /// The current field had a quoted section; later quotes are literal.
    field_quoted: bool,
}

impl Tokenizer {
    fn end_field(&mut self) {
        self.row.push(std::mem::take(&mut self.field));
        self.field_quoted = false;
    }

    fn end_row(&mut self) {
        self.end_field();
        self.rows.push(std::mem::take(&mut self.row));
    }

    fn at_field_start(&self) -> bool {
        self.field.is_empty() && !self.field_quoted
    }
}

/// Tokenize `text` into rows of raw fields.
pub fn tokenize(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let chars: Vec<char> = text.chars().collect();

    let mut t = Tokenizer::default();
    let mut open: Option<QuoteOpen> = None;
    let mut literal_quote_at: Option<usize> = None;
    let mut i = 0;

    loop {
        if i >= chars.len() {
            match open.take() {
                Some(q) => {
                    // Unterminated: rewind to the opening quote.
                    t.rows.truncate(q.rows_len);
                    t.row = q.row;
                    t.field.clear();
                    t.field_quoted = false;
                    literal_quote_at = Some(q.pos);
                    i = q.pos;
                    continue;
                }
                None => break,
            }
        }

        let c = chars[i];

        if open.is_some() {
            if c == '"' {
                if chars.get(i + 1) == Some(&'"') {
                    t.field.push('"');
                    i += 2;
                    continue;
                }
                open = None;
            } else {
                t.field.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' if t.at_field_start() && literal_quote_at != Some(i) => {
                open = Some(QuoteOpen {
                    pos: i,
                    rows_len: t.rows.len(),
                    row: t.row.clone(),
                });
                t.field_quoted = true;
            }
            ',' => t.end_field(),
            '\r' => {
                if chars.get(i + 1) == Some(&'\n') {
                    i += 1;
                }
                t.end_row();
            }
            '\n' => t.end_row(),
            other => t.field.push(other),
        }
        i += 1;
    }

    if !t.field.is_empty() || !t.row.is_empty() || t.field_quoted {
        t.end_row();
    }

    t.rows
        .into_iter()
        .filter(|r| !(r.len() == 1 && r[0].trim().is_empty()))
        .collect()
}
