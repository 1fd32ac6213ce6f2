//! Text chunking for streaming synthesis
//!
//! Splits request text into short, ordered synthesis units so the first audio
//! can be produced long before the whole text has been synthesized.

/// Words per unit when nothing else is configured
pub const DEFAULT_MAX_UNIT_WORDS: usize = 5;

const TERMINAL_PUNCTUATION: [char; 4] = ['.', '!', '?', '…'];

/// Quotes and brackets that may follow terminal punctuation
const CLOSING_MARKS: [char; 7] = ['"', '\'', ')', ']', '\u{201D}', '\u{2019}', '\u{00BB}'];

/// One synthesis unit of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUnit {
    /// Zero-based position within the request
    pub index: usize,
    /// Text sent to the model and echoed back as `text_chunk`
    pub text_segment: String,
    /// True only for the last unit of the request
    pub is_final: bool,
}

/// Split `text` into units of at most `max_unit_words` whitespace-separated words.
///
/// Units keep the original word order, carry consecutive indices starting at 0,
/// and exactly the last one is marked final. The final unit receives a trailing
/// "." unless the text already ends with terminal punctuation, possibly
/// followed by closing quotes or brackets. Text with no
/// words yields no units. A `max_unit_words` of 0 is treated as 1.
pub fn split(text: &str, max_unit_words: usize) -> Vec<ChunkUnit> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let groups: Vec<&[&str]> = words.chunks(max_unit_words.max(1)).collect();
    let last = groups.len() - 1;

    groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| {
            let mut text_segment = group.join(" ");
            let is_final = index == last;
            if is_final && !ends_sentence(&text_segment) {
                text_segment.push('.');
            }
            ChunkUnit {
                index,
                text_segment,
                is_final,
            }
        })
        .collect()
}

fn ends_sentence(segment: &str) -> bool {
    segment
        .trim_end_matches(CLOSING_MARKS)
        .ends_with(TERMINAL_PUNCTUATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(units: &[ChunkUnit]) -> Vec<&str> {
        units.iter().map(|u| u.text_segment.as_str()).collect()
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert!(split("", 5).is_empty());
        assert!(split("   \n\t ", 5).is_empty());
    }

    #[test]
    fn test_single_unit_gets_period() {
        let units = split("Hello world", 5);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text_segment, "Hello world.");
        assert_eq!(units[0].index, 0);
        assert!(units[0].is_final);
    }

    #[test]
    fn test_groups_of_five() {
        let units = split("one two three four five six seven", 5);
        assert_eq!(
            segments(&units),
            vec!["one two three four five", "six seven."]
        );
        assert!(!units[0].is_final);
        assert!(units[1].is_final);
    }

    #[test]
    fn test_exact_multiple() {
        let units = split("a b c d e f g h i j", 5);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].text_segment, "f g h i j.");
    }

    #[test]
    fn test_existing_terminal_punctuation_kept() {
        assert_eq!(split("Are you there?", 5)[0].text_segment, "Are you there?");
        assert_eq!(split("Stop!", 5)[0].text_segment, "Stop!");
        assert_eq!(split("Done.", 5)[0].text_segment, "Done.");
        assert_eq!(split("Well…", 5)[0].text_segment, "Well…");
    }

    #[test]
    fn test_internal_whitespace_collapsed() {
        let units = split("  Hello \n\n  there\tfriend  ", 2);
        assert_eq!(segments(&units), vec!["Hello there", "friend."]);
    }

    #[test]
    fn test_zero_words_treated_as_one() {
        let units = split("a b", 0);
        assert_eq!(segments(&units), vec!["a", "b."]);
    }

    #[test]
    fn test_units_cover_input_in_order() {
        let text = "the quick brown fox jumps over the lazy dog and keeps running far away";
        let units = split(text, 3);

        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.index, i);
            assert_eq!(unit.is_final, i == units.len() - 1);
            assert!(unit.text_segment.split_whitespace().count() <= 3);
        }

        let rejoined = segments(&units).join(" ");
        assert_eq!(rejoined.trim_end_matches('.'), text);
    }

    #[test]
    fn test_closing_quote_after_punctuation() {
        assert_eq!(segments(&split("He said \"hi.\"", 5)), vec!["He said \"hi.\""]);
        assert_eq!(segments(&split("(Really?)", 5)), vec!["(Really?)"]);
        assert_eq!(segments(&split("It was \u{201C}fine!\u{201D}", 5)), vec!["It was \u{201C}fine!\u{201D}"]);
        // A closing quote alone does not end the sentence
        assert_eq!(segments(&split("He said \"hi\"", 5)), vec!["He said \"hi\"."]);
    }
}
