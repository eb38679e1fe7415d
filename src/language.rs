//! Best-effort language code extraction from free-form model output

/// Value returned when no code can be found
pub const UNKNOWN_LANGUAGE: &str = "unknown";

fn is_word(c: u8) -> bool
{   c.is_ascii_alphanumeric() || c == b'_'
}

fn at_boundary(bytes: &[u8], pos: usize) -> bool
{   pos == bytes.len() || !is_word(bytes[pos])
}

/// Find the first standalone two-letter token, optionally followed
/// by a `-XX` region, and return it lower-cased. Models often ignore
/// "respond only with the code", so anything else in the reply is
/// skipped; when nothing matches the result is `"unknown"`.
///
/// Note that a reply of just `"unknown"` yields `"unknown"` because
/// the word has no two-letter token of its own.
pub fn extract_language_code(raw: &str) -> String
{   let bytes = raw.as_bytes();
    let mut i = 0;
    while i + 2 <= bytes.len()
    {   let starts_word = i == 0 || !is_word(bytes[i - 1]);
        if starts_word
          && bytes[i].is_ascii_alphabetic()
          && bytes[i + 1].is_ascii_alphabetic()
        {   let end = i + 2;
            if end + 3 <= bytes.len()
              && bytes[end] == b'-'
              && bytes[end + 1].is_ascii_alphabetic()
              && bytes[end + 2].is_ascii_alphabetic()
              && at_boundary(bytes, end + 3)
            {   return raw[i..end + 3].to_ascii_lowercase();
            }
            if at_boundary(bytes, end)
            {   return raw[i..end].to_ascii_lowercase();
            }
        }
        i += 1;
    }
    UNKNOWN_LANGUAGE.to_string()
}

/// Compare two language codes ignoring case and region suffix
pub fn same_language(a: &str, b: &str) -> bool
{   let primary = |code: &str| {
      code.split('-').next().unwrap_or("").to_ascii_lowercase()
    };
    primary(a) == primary(b)
}
