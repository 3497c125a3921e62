use crate::error::IngestError;
use crate::models::{ChunkingOptions, DocumentChunk, DocumentRecord};
use chrono::{DateTime, Utc};
use regex::Regex;

const AMOUNT_PATTERN: &str = r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|thousand|[mbk]\b))?";

/// Cleans extracted text: collapses whitespace runs to a single space,
/// strips characters outside printable ASCII, and trims. Blank-line
/// paragraph boundaries are preserved as exactly `\n\n` so the paragraph
/// split downstream still sees them.
///
/// Pure and deterministic; always returns a string, possibly empty.
pub fn clean_text(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let sanitized: String = line
            .chars()
            .filter(|c| c.is_ascii() && (*c == ' ' || *c == '\t' || !c.is_ascii_control()))
            .collect();

        let words: Vec<&str> = sanitized.split_whitespace().collect();
        if words.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.extend(words.into_iter().map(str::to_string));
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

/// Splits cleaned text into candidate sections.
///
/// Paragraph split first; if it produced nothing, or the longest section
/// exceeds the section ceiling (typical for tabular text with no blank
/// lines), the whole text is re-split into non-overlapping fixed-size
/// windows in document order instead, keeping every candidate bounded.
pub fn split_sections(clean: &str, options: &ChunkingOptions) -> Vec<String> {
    let sections: Vec<String> = clean
        .split("\n\n")
        .map(|section| section.trim().to_string())
        .filter(|section| !section.is_empty())
        .collect();

    let longest = sections
        .iter()
        .map(|section| section.chars().count())
        .max()
        .unwrap_or(0);

    if !sections.is_empty() && longest <= options.max_section_chars {
        return sections;
    }

    let chars: Vec<char> = clean.chars().collect();
    chars
        .chunks(options.window_chars)
        .map(|window| window.iter().collect::<String>().trim().to_string())
        .filter(|window| !window.is_empty())
        .collect()
}

/// Builds the ordered chunk sequence for one document.
///
/// Candidates below the minimum length are dropped and ordinals are
/// assigned afterwards, so ids `{document_id}_{ordinal}` are contiguous
/// over the emitted sequence. Every chunk carries the same ingestion
/// timestamp and source metadata. An empty result is a defined terminal
/// state for the caller: nothing to index.
pub fn build_chunks(
    clean: &str,
    document: &DocumentRecord,
    options: &ChunkingOptions,
    timestamp: DateTime<Utc>,
) -> Result<Vec<DocumentChunk>, IngestError> {
    let amount_re = Regex::new(AMOUNT_PATTERN)?;

    let chunks = split_sections(clean, options)
        .into_iter()
        .filter(|section| section.chars().count() >= options.min_chunk_chars)
        .enumerate()
        .map(|(ordinal, text)| DocumentChunk {
            chunk_id: format!("{}_{}", document.document_id, ordinal),
            document_id: document.document_id.clone(),
            amounts: extract_amount_tokens(&amount_re, &text),
            text,
            vector: None,
            source_filename: document.source_filename.clone(),
            source_url: document.source_url.clone(),
            timestamp,
        })
        .collect();

    Ok(chunks)
}

/// Currency-amount tokens found in a chunk, first-seen order, no repeats.
fn extract_amount_tokens(amount_re: &Regex, text: &str) -> Vec<String> {
    let mut amounts: Vec<String> = Vec::new();
    for found in amount_re.find_iter(text) {
        let token = found.as_str().trim().to_string();
        if !amounts.contains(&token) {
            amounts.push(token);
        }
    }
    amounts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document() -> DocumentRecord {
        DocumentRecord {
            document_id: "doc-1".to_string(),
            source_filename: "budget.pdf".to_string(),
            source_url: Some("https://blobs.example/budget.pdf".to_string()),
            checksum: "checksum".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn clean_collapses_runs_and_strips_non_ascii() {
        let input = "Total:\t  $450M\u{2014}approved\r\nfor 2024  ";
        assert_eq!(clean_text(input), "Total: $450Mapproved for 2024");
    }

    #[test]
    fn clean_preserves_paragraph_boundaries() {
        let input = "first  paragraph\nstill first\n\n\n\nsecond   paragraph\n";
        assert_eq!(
            clean_text(input),
            "first paragraph still first\n\nsecond paragraph"
        );
    }

    #[test]
    fn clean_of_whitespace_only_input_is_empty() {
        assert_eq!(clean_text("  \n\t \n\n "), "");
    }

    #[test]
    fn chunking_is_deterministic() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let text = format!("{}\n\n{}", "a".repeat(120), "b".repeat(120));
        let now = Utc::now();

        let first = build_chunks(&text, &document, &options, now).unwrap();
        let second = build_chunks(&text, &document, &options, now).unwrap();

        assert_eq!(first.len(), second.len());
        for (left, right) in first.iter().zip(second.iter()) {
            assert_eq!(left.chunk_id, right.chunk_id);
            assert_eq!(left.text, right.text);
        }
    }

    #[test]
    fn three_paragraphs_become_three_ordered_chunks() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let text = (0..3u8)
            .map(|i| format!("{}{}", char::from(b'a' + i), "x".repeat(299)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = build_chunks(&text, &document, &options, Utc::now()).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_id, "doc-1_0");
        assert_eq!(chunks[1].chunk_id, "doc-1_1");
        assert_eq!(chunks[2].chunk_id, "doc-1_2");
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 2_000));
    }

    #[test]
    fn uniform_text_falls_back_to_fixed_windows() {
        let document = test_document();
        let options = ChunkingOptions::default();
        // 5000 chars without any blank-line breaks: ceil(5000/1500) windows.
        let text = "r".repeat(5_000);

        let chunks = build_chunks(&text, &document, &options, Utc::now()).unwrap();

        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 1_500));
        assert_eq!(chunks[3].text.chars().count(), 500);
    }

    #[test]
    fn short_candidates_are_dropped_and_ordinals_stay_contiguous() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let text = format!("{}\n\ntoo short\n\n{}", "a".repeat(100), "b".repeat(100));

        let chunks = build_chunks(&text, &document, &options, Utc::now()).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, "doc-1_0");
        assert_eq!(chunks[1].chunk_id, "doc-1_1");
        assert!(chunks.iter().all(|c| c.text.chars().count() >= 50));
    }

    #[test]
    fn chunk_ids_are_pairwise_distinct() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let text = "u".repeat(6_200);

        let chunks = build_chunks(&text, &document, &options, Utc::now()).unwrap();
        let mut ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let chunks = build_chunks("", &document, &options, Utc::now()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn amount_tokens_are_collected_per_chunk() {
        let document = test_document();
        let options = ChunkingOptions::default();
        let text = format!(
            "Total budget was $450 million with a relief fund of $12.5M, {}",
            "padding ".repeat(10)
        );

        let chunks = build_chunks(&text, &document, &options, Utc::now()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].amounts.contains(&"$450 million".to_string()));
        assert!(chunks[0].amounts.contains(&"$12.5M".to_string()));
    }
}
