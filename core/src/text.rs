use std::io::Read;
use std::path::Path;

use crate::model::{ContentPreview, HighlightSpan};

fn is_binary_file(path: &Path) -> std::io::Result<bool> {
    let mut f = std::fs::File::open(path)?;
    let mut buf = [0u8; 1024];
    let read = f.read(&mut buf)?;
    Ok(buf[..read].contains(&0))
}

/// Read a file as UTF-8 text. `Ok(None)` means the file exists but is
/// binary or not valid UTF-8.
pub fn read_text_file(path: &Path) -> std::io::Result<Option<String>> {
    if is_binary_file(path)? {
        return Ok(None);
    }

    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(None),
        Err(e) => Err(e),
    }
}

/// Collapse sorted character positions into contiguous spans.
pub fn spans_from_positions(positions: &[u32]) -> Vec<HighlightSpan> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut spans: Vec<HighlightSpan> = Vec::new();
    for pos in sorted {
        let pos = pos as usize;
        match spans.last_mut() {
            Some(last) if last.end == pos => last.end = pos + 1,
            _ => spans.push(HighlightSpan::new(pos, pos + 1)),
        }
    }
    spans
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Every non-overlapping, case-insensitive occurrence of `needle` in
/// `haystack`, as character offsets.
///
/// Case folding is done per character so offsets always line up with
/// `haystack.chars()`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Vec<HighlightSpan> {
    let needle: Vec<char> = needle.chars().map(fold).collect();
    if needle.is_empty() {
        return Vec::new();
    }
    let hay: Vec<char> = haystack.chars().map(fold).collect();

    let mut spans = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        if hay[i..i + needle.len()] == needle[..] {
            spans.push(HighlightSpan::new(i, i + needle.len()));
            i += needle.len();
        } else {
            i += 1;
        }
    }
    spans
}

/// The line holding `spans[0]`, with every span on that line rebased to it.
pub fn preview_line(content: &str, spans: &[HighlightSpan]) -> ContentPreview {
    let Some(first) = spans.first() else {
        let text = content.lines().next().unwrap_or_default().to_string();
        return ContentPreview {
            line: 0,
            text,
            spans: Vec::new(),
        };
    };

    let mut line_start = 0usize;
    for (line_no, line) in content.split('\n').enumerate() {
        let line_len = line.chars().count();
        let line_end = line_start + line_len;
        if first.start >= line_start && first.start <= line_end {
            let local = spans
                .iter()
                .filter(|s| s.start >= line_start && s.start < line_end)
                .map(|s| HighlightSpan::new(s.start - line_start, s.end.min(line_end) - line_start))
                .collect();
            return ContentPreview {
                line: line_no,
                text: line.trim_end_matches('\r').to_string(),
                spans: local,
            };
        }
        // +1 for the '\n' consumed by split
        line_start = line_end + 1;
    }

    ContentPreview {
        line: 0,
        text: String::new(),
        spans: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_merge_into_runs() {
        let spans = spans_from_positions(&[5, 0, 1, 2, 6, 9]);
        assert_eq!(
            spans,
            vec![
                HighlightSpan::new(0, 3),
                HighlightSpan::new(5, 7),
                HighlightSpan::new(9, 10)
            ]
        );
    }

    #[test]
    fn find_is_case_insensitive_and_non_overlapping() {
        let spans = find_ignore_case("Dir dir DIRdir", "dir");
        assert_eq!(
            spans,
            vec![
                HighlightSpan::new(0, 3),
                HighlightSpan::new(4, 7),
                HighlightSpan::new(8, 11),
                HighlightSpan::new(11, 14)
            ]
        );
        assert!(find_ignore_case("aaa", "").is_empty());
        assert_eq!(find_ignore_case("aaaa", "aa").len(), 2);
    }

    #[test]
    fn find_offsets_are_in_characters() {
        let spans = find_ignore_case("héllo wörld", "WÖR");
        assert_eq!(spans, vec![HighlightSpan::new(6, 9)]);
    }

    #[test]
    fn preview_picks_line_of_first_match() {
        let content = "git config --global user.name\ngit config --global user.email \"x\"";
        let spans = find_ignore_case(content, "email");
        let preview = preview_line(content, &spans);
        assert_eq!(preview.line, 1);
        assert_eq!(preview.text, "git config --global user.email \"x\"");
        assert_eq!(preview.spans, vec![HighlightSpan::new(25, 30)]);
    }

    #[test]
    fn read_text_file_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::write(&bin, [0u8, 1, 2, 3]).unwrap();
        assert!(read_text_file(&bin).unwrap().is_none());

        let txt = dir.path().join("txt");
        std::fs::write(&txt, "ssh ${user}@${host}").unwrap();
        assert_eq!(read_text_file(&txt).unwrap().as_deref(), Some("ssh ${user}@${host}"));
    }
}
