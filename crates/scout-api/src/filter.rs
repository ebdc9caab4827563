//! Status filter grammar.
//!
//! A filter expression is a comma-separated list of tokens. `NAME`
//! requires the check to be true, `!NAME` requires it false or absent.
//! Whitespace around tokens is trimmed; empty tokens (and a bare `!`)
//! are dropped. Repeated query parameters concatenate.

use std::collections::HashMap;

/// Parse the values of one query parameter into a status filter.
pub fn parse_status_filter<'a>(values: impl IntoIterator<Item = &'a str>) -> HashMap<String, bool> {
    let mut filter = HashMap::new();

    for value in values {
        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.strip_prefix('!') {
                Some(name) => {
                    let name = name.trim();
                    if !name.is_empty() {
                        filter.insert(name.to_string(), false);
                    }
                }
                None => {
                    filter.insert(token.to_string(), true);
                }
            }
        }
    }

    filter
}
