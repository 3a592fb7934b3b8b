// src/format.rs
//! Message formatting for Telegram MarkdownV2.
//!
//! Title and summary are escaped separately, then placed into a fixed template
//! whose own markup (the bold title) stays unescaped. The result is split into
//! size-bounded chunks whose concatenation is exactly the templated message.

use crate::config::TelegramSettings;

/// Characters Telegram MarkdownV2 treats as markup.
pub const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

const BANNER: &str = "📰";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    pub text: String,
    /// Only ever set on the first chunk of a message.
    pub image_url: Option<String>,
}

pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for ch in s.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// The full templated message before chunking.
pub fn render_message(title: &str, summary: &str) -> String {
    format!(
        "{BANNER} *{}*\n\n{}",
        escape_markdown(title.trim()),
        escape_markdown(summary.trim())
    )
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    chunk_limit: usize,
    caption_limit: usize,
}

impl Formatter {
    pub fn new(chunk_limit: usize, caption_limit: usize) -> Self {
        Self {
            chunk_limit: chunk_limit.max(1),
            caption_limit: caption_limit.max(1),
        }
    }

    pub fn from_settings(s: &TelegramSettings) -> Self {
        Self::new(s.chunk_limit, s.caption_limit)
    }

    /// Build ordered chunks. With an image, the first chunk is a photo caption
    /// and is bounded by the caption limit instead of the chunk limit.
    pub fn format(&self, title: &str, summary: &str, image_url: Option<&str>) -> Vec<MessageChunk> {
        let message = render_message(title, summary);
        let first_limit = match image_url {
            Some(_) => self.caption_limit.min(self.chunk_limit),
            None => self.chunk_limit,
        };

        split_chunks(&message, first_limit, self.chunk_limit)
            .into_iter()
            .enumerate()
            .map(|(i, text)| MessageChunk {
                text,
                image_url: if i == 0 {
                    image_url.map(str::to_string)
                } else {
                    None
                },
            })
            .collect()
    }

    /// Escaped "nothing new" notice for a quiet period of `quiet_for`.
    pub fn quiet_notice(&self, quiet_for: chrono::Duration) -> String {
        escape_markdown(&format!(
            "🕒 No new updates in the last {}. Still watching for fresh stories.",
            human_duration(quiet_for)
        ))
    }
}

/// Split `text` on char boundaries: the first chunk holds at most `first_limit`
/// chars, the rest at most `rest_limit`. A break prefers the last newline in
/// the second half of the window, never separates an escaping backslash from
/// the character it escapes and never starts a chunk with a joiner or
/// variation selector.
pub fn split_chunks(text: &str, first_limit: usize, rest_limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let limit = if out.is_empty() { first_limit } else { rest_limit }.max(1);
        let mut end = (start + limit).min(chars.len());

        if end < chars.len() {
            // 1) Prefer a paragraph/line boundary late in the window.
            let floor = start + limit / 2;
            if let Some(pos) = (floor..end).rev().find(|&i| chars[i] == '\n') {
                end = pos + 1;
            }

            // Each step can expose a new bad boundary; repeat until stable.
            loop {
                let before = end;

                // 2) Keep joiners/variation selectors with the symbol before them.
                while end - start > 1 && is_joining(chars[end]) {
                    end -= 1;
                }
                if end - start > 1 && chars[end - 1] == '\u{200D}' {
                    end -= 1;
                }

                // 3) An odd run of trailing backslashes ends in an escape prefix.
                let trailing = chars[start..end]
                    .iter()
                    .rev()
                    .take_while(|c| **c == '\\')
                    .count();
                if trailing % 2 == 1 && end - start > 1 {
                    end -= 1;
                }

                if end == before {
                    break;
                }
            }
        }

        out.push(chars[start..end].iter().collect());
        start = end;
    }

    out
}

fn is_joining(c: char) -> bool {
    matches!(c, '\u{200D}' | '\u{FE0E}' | '\u{FE0F}' | '\u{20E3}')
        || ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

fn human_duration(d: chrono::Duration) -> String {
    let mins = d.num_minutes().max(0);
    if mins >= 120 && mins % 60 == 0 {
        format!("{} hours", mins / 60)
    } else if mins >= 60 {
        let h = mins / 60;
        let m = mins % 60;
        if m == 0 {
            "1 hour".to_string()
        } else {
            format!("{h}h {m}m")
        }
    } else if mins == 1 {
        "1 minute".to_string()
    } else {
        format!("{mins} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_markdown_char() {
        assert_eq!(
            escape_markdown("a_b*c[d](e)~`>#+-=|{}.!\\"),
            "a\\_b\\*c\\[d\\]\\(e\\)\\~\\`\\>\\#\\+\\-\\=\\|\\{\\}\\.\\!\\\\"
        );
    }

    #[test]
    fn template_markup_is_not_escaped() {
        let msg = render_message("Sensex *jumps* 2%", "Up_and_away.");
        assert_eq!(msg, "📰 *Sensex \\*jumps\\* 2%*\n\nUp\\_and\\_away\\.");
    }

    #[test]
    fn short_message_is_one_chunk_with_image() {
        let f = Formatter::new(3900, 1024);
        let chunks = f.format("Title", "Summary", Some("https://img.example/a.jpg"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].image_url.as_deref(), Some("https://img.example/a.jpg"));
    }

    #[test]
    fn chunks_round_trip_and_respect_limits() {
        let f = Formatter::new(100, 40);
        let summary = "Markets (NSE) rose 1.5% today! ".repeat(20);
        let chunks = f.format("Big day", &summary, Some("https://img.example/a.jpg"));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, render_message("Big day", &summary));
        assert!(chunks[0].text.chars().count() <= 40);
        for c in &chunks[1..] {
            assert!(c.text.chars().count() <= 100);
            assert!(c.image_url.is_none());
        }
    }

    #[test]
    fn never_ends_chunk_on_escape_prefix() {
        // Every char escaped: "\." pairs. An odd limit would land between them.
        let text = escape_markdown(&".".repeat(20));
        let chunks = split_chunks(&text, 5, 5);
        for c in &chunks {
            let trailing = c.chars().rev().take_while(|ch| *ch == '\\').count();
            assert_eq!(trailing % 2, 0, "chunk {c:?} ends in an escape prefix");
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_symbols_stay_whole() {
        let text = "⚠️".repeat(10);
        let chunks = split_chunks(&text, 3, 3);
        assert_eq!(chunks.concat(), text);
        for c in &chunks {
            assert!(!c.starts_with('\u{FE0F}'));
            assert!(c.chars().count() <= 3);
        }

        // ZWJ sequence straddling the limit moves whole into the next chunk.
        let family = "a👨\u{200D}👩";
        let chunks = split_chunks(family, 3, 3);
        assert_eq!(chunks, vec!["a".to_string(), "👨\u{200D}👩".to_string()]);
        for c in &chunks {
            assert!(!c.starts_with(is_joining));
            assert!(!c.ends_with('\u{200D}'));
        }
    }

    #[test]
    fn prefers_newline_boundaries() {
        let text = format!("{}\n{}", "a".repeat(8), "b".repeat(8));
        let chunks = split_chunks(&text, 12, 12);
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(8)));
        assert_eq!(chunks[1], "b".repeat(8));
    }

    #[test]
    fn quiet_notice_is_escaped_and_readable() {
        let f = Formatter::new(3900, 1024);
        let n = f.quiet_notice(chrono::Duration::hours(3));
        assert!(n.contains("3 hours"));
        assert!(n.ends_with("stories\\."));
    }
}
