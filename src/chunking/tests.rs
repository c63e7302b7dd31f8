use super::*;

fn sentence_text(sentences: usize) -> String {
    "The wheel of practice turns slowly but it always turns. ".repeat(sentences)
}

#[test]
fn short_input_yields_nothing() {
    assert!(chunk_text("", 1000, 200).is_empty());
    assert!(chunk_text("too short to index", 1000, 200).is_empty());
}

#[test]
fn whitespace_only_input_yields_nothing() {
    // Long enough to pass the length floor, but nothing survives trimming.
    assert!(chunk_text(&" ".repeat(60), 1000, 200).is_empty());
    assert!(chunk_text(&"\n\n\t \n  \t ".repeat(8), 1000, 200).is_empty());
}

#[test]
fn small_input_is_a_single_trimmed_chunk() {
    let text = "  This passage is comfortably longer than fifty characters but fits in one chunk.  ";
    let chunks = chunk_text(text, 1000, 200);

    assert_eq!(chunks, vec![text.trim().to_string()]);
}

#[test]
fn long_input_produces_multiple_nonempty_chunks() {
    let text = sentence_text(100);
    let chunks = chunk_text(&text, 500, 100);

    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(!chunk.is_empty());
        assert!(chunk.len() <= 500, "chunk exceeded target size: {}", chunk.len());
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = sentence_text(80);

    let first = chunk_text(&text, 400, 80);
    let second = chunk_text(&text, 400, 80);

    assert_eq!(first, second);
}

#[test]
fn snaps_to_paragraph_break() {
    // A paragraph break sits inside the boundary search window of the first chunk,
    // so the cut should land there rather than mid-sentence.
    let first_para = "Alpha beta gamma delta epsilon zeta eta theta. ".repeat(6);
    let text = format!("{}\n\nSecond paragraph begins here and continues with more text. {}", first_para.trim(), sentence_text(20));

    let chunks = chunk_text(&text, 350, 0);

    assert!(chunks.len() >= 2);
    assert!(chunks[0].ends_with("theta."), "first chunk was: {:?}", chunks[0]);
    assert!(chunks[1].starts_with("Second paragraph"));
}

#[test]
fn snaps_to_sentence_end() {
    // No paragraph breaks, so the sentence boundary should win.
    let text = sentence_text(40);
    let chunks = chunk_text(&text, 300, 60);

    assert!(chunks.len() >= 2);
    assert!(chunks[0].ends_with('.'), "first chunk was: {:?}", chunks[0]);
}

#[test]
fn falls_back_to_whitespace() {
    // Words only, no sentence punctuation anywhere.
    let text = "lorem ipsum dolor sit amet consectetur adipiscing elit sed ".repeat(20);
    let chunks = chunk_text(&text, 300, 50);

    assert!(chunks.len() >= 2);
    // Whitespace snapping keeps words intact
    for chunk in &chunks {
        assert!(!chunk.starts_with(' '));
        assert!(!chunk.ends_with(' '));
    }
}

#[test]
fn unbroken_input_still_terminates() {
    let text = "x".repeat(5000);
    let chunks = chunk_text(&text, 1000, 200);

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.len() <= 1000);
    }
}

#[test]
fn multibyte_input_never_splits_a_character() {
    let text = "ॐ नमः शिवाय महादेवाय सर्वं शक्तिमयं जगत् । ".repeat(40);
    let chunks = chunk_text(&text, 300, 60);

    assert!(chunks.len() >= 2);
    // Slicing inside a UTF-8 sequence would have panicked before we got here;
    // verify the chunks are real substrings of the input.
    for chunk in &chunks {
        assert!(text.contains(chunk.as_str()));
    }
}

/// Length of the longest string that is both a suffix of `a` and a prefix of `b`.
fn shared_overlap(a: &str, b: &str) -> usize {
    (1..=a.len().min(b.len()))
        .rev()
        .find(|&k| {
            a.is_char_boundary(a.len() - k) && b.is_char_boundary(k) && a[a.len() - k..] == b[..k]
        })
        .unwrap_or(0)
}

#[test]
fn adjacent_chunks_overlap_at_most_the_configured_amount() {
    // Distinct sentences so a shared suffix/prefix can only come from the
    // genuine overlap region, not from repeated content.
    let text: String = (0..120)
        .map(|i| format!("Sentence number {i} carries its own distinct words. "))
        .collect();
    let chunks = chunk_text(&text, 500, 100);

    assert!(chunks.len() >= 2);
    for pair in chunks.windows(2) {
        let shared = shared_overlap(&pair[0], &pair[1]);
        assert!(
            shared <= 100,
            "chunks shared {shared} bytes: {:?} / {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn chunks_cover_the_whole_input() {
    let text = sentence_text(100);
    let trimmed = text.trim();
    let chunks = chunk_text(&text, 500, 100);

    assert!(chunks.len() >= 2);
    assert!(trimmed.starts_with(chunks[0].as_str()));
    assert!(
        trimmed.ends_with(chunks.last().expect("at least one chunk").as_str()),
        "final chunk must reach the end of the input"
    );
    for chunk in &chunks {
        assert!(trimmed.contains(chunk.as_str()));
    }
}
