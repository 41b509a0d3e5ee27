/// Split `text` after its first `n` chars.
///
/// Both halves borrow from `text`; the split always lands on a char
/// boundary. If `text` has `n` chars or fewer the remainder is empty.
pub fn split_chars(text: &str, n: usize) -> (&str, &str) {
    match text.char_indices().nth(n) {
        Some((idx, _)) => text.split_at(idx),
        None => (text, ""),
    }
}

/// Number of chars in `text`, the unit every message limit is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Lazily split `text` into consecutive pieces of at most `limit` chars.
///
/// Concatenating the pieces reproduces `text`. An empty `text` yields no
/// pieces. A `limit` of zero is treated as one.
pub fn chunk(text: &str, limit: usize) -> Chunks<'_> {
    Chunks {
        rest: text,
        limit: limit.max(1),
    }
}

/// Iterator returned by [`chunk`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    limit: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let (head, tail) = split_chars(self.rest, self.limit);
        self.rest = tail;
        Some(head)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        assert_eq!(chunk("", 10).count(), 0);
    }

    #[test]
    fn chunks_reassemble_and_respect_limit() {
        let samples = [
            "a",
            "hello world",
            "exactly10!",
            "ünïcödé strings with ✓ marks and 日本語 text",
        ];
        for text in samples {
            for limit in 1..=12 {
                let pieces: Vec<&str> = chunk(text, limit).collect();
                assert_eq!(pieces.concat(), text);
                assert!(pieces.iter().all(|p| char_len(p) <= limit));
                assert!(pieces[..pieces.len() - 1].iter().all(|p| char_len(p) == limit));
            }
        }
    }

    #[test]
    fn zero_limit_is_clamped() {
        let pieces: Vec<&str> = chunk("abc", 0).collect();
        assert_eq!(pieces, vec!["a", "b", "c"]);
    }

    #[test]
    fn split_chars_respects_char_boundaries() {
        assert_eq!(split_chars("日本語", 1), ("日", "本語"));
        assert_eq!(split_chars("abc", 3), ("abc", ""));
        assert_eq!(split_chars("abc", 10), ("abc", ""));
        assert_eq!(split_chars("abc", 0), ("", "abc"));
    }
}
