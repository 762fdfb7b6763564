//! Markdown-to-block conversion.
//!
//! Turns a freeform post text body into a typed tree of block nodes
//! consumable by a document API. The grammar is line-oriented and handled in
//! a single pass with no nested block types:
//!
//! | Line shape                  | Block                                  |
//! |-----------------------------|----------------------------------------|
//! | `#`..`###` + space          | [`BlockNode::Heading`] (level 1..3)    |
//! | `-` / `*` + space           | unordered [`BlockNode::ListItem`]      |
//! | digits + `.` + space        | ordered [`BlockNode::ListItem`]        |
//! | anything else, non-blank    | [`BlockNode::Paragraph`] with bold runs|
//! | blank                       | discarded                              |
//!
//! Each line is classified into a tagged [`LineKind`] first, then assembled
//! into a flat list; the table above is the single source of truth. Inline
//! `**bold**` emphasis is parsed only inside paragraphs; headings carry their
//! text verbatim. Unmatched emphasis markers degrade to literal characters.
//!
//! Conversion is pure and deterministic: no I/O, no timestamps, no random
//! IDs. Consecutive list-marker lines stay independent items; ordering alone
//! conveys grouping.

/// One structured content node. Ordering within the produced sequence is
/// significant and matches the source text's line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockNode {
    Heading { level: u8, text: String },
    ListItem { ordered: bool, text: String },
    Paragraph { runs: Vec<TextRun> },
}

/// A contiguous span of paragraph text with one emphasis setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

/// Per-line classification, the intermediate form between raw text and blocks.
#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Heading { level: u8, rest: &'a str },
    ListItem { ordered: bool, rest: &'a str },
    Paragraph(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }

    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=3).contains(&hashes) {
        if let Some(rest) = line[hashes..].strip_prefix(' ') {
            return LineKind::Heading {
                level: hashes as u8,
                rest: rest.trim_start(),
            };
        }
    }

    for marker in ["- ", "* "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return LineKind::ListItem {
                ordered: false,
                rest: rest.trim_start(),
            };
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return LineKind::ListItem {
                ordered: true,
                rest: rest.trim_start(),
            };
        }
    }

    LineKind::Paragraph(line)
}

/// Convert a text body into its ordered block sequence.
pub fn to_blocks(text: &str) -> Vec<BlockNode> {
    text.lines()
        .filter_map(|line| match classify(line) {
            LineKind::Blank => None,
            LineKind::Heading { level, rest } => Some(BlockNode::Heading {
                level,
                text: rest.to_string(),
            }),
            LineKind::ListItem { ordered, rest } => Some(BlockNode::ListItem {
                ordered,
                text: rest.to_string(),
            }),
            LineKind::Paragraph(line) => Some(BlockNode::Paragraph {
                runs: bold_runs(line),
            }),
        })
        .collect()
}

/// Split paragraph text into plain and bold runs.
///
/// Substrings delimited by a doubled `**` marker become bold runs; everything
/// else stays plain, interleaved in original order. A marker with no later
/// closer, or an immediately-adjacent closer (`****`), is literal text.
pub fn bold_runs(text: &str) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut push_plain = |runs: &mut Vec<TextRun>, s: &str| {
        if s.is_empty() {
            return;
        }
        // Adjacent plain spans collapse into one run.
        if let Some(last) = runs.last_mut() {
            if !last.bold {
                last.text.push_str(s);
                return;
            }
        }
        runs.push(TextRun {
            text: s.to_string(),
            bold: false,
        });
    };

    let mut rest = text;
    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        match after.find("**") {
            // Non-empty delimited span: emit preceding plain, then the bold run.
            Some(close) if close > 0 => {
                push_plain(&mut runs, &rest[..open]);
                runs.push(TextRun {
                    text: after[..close].to_string(),
                    bold: true,
                });
                rest = &after[close + 2..];
            }
            // `****`: the opener is literal; keep scanning past it.
            Some(_) => {
                push_plain(&mut runs, &rest[..open + 2]);
                rest = after;
            }
            // Unterminated marker: the remainder is literal.
            None => {
                push_plain(&mut runs, rest);
                rest = "";
                break;
            }
        }
    }
    push_plain(&mut runs, rest);

    if runs.is_empty() && !text.is_empty() {
        runs.push(TextRun {
            text: text.to_string(),
            bold: false,
        });
    }
    runs
}

/// Render blocks back to the textual form [`to_blocks`] accepts.
///
/// The reverse side of the supported subset (heading/list/bold): feeding the
/// rendering back through [`to_blocks`] reconstructs an equivalent sequence.
/// Consecutive ordered items are numbered sequentially for readability; the
/// numbering resets at any non-ordered block.
pub fn render_blocks(blocks: &[BlockNode]) -> String {
    let mut lines = Vec::with_capacity(blocks.len());
    let mut ordinal = 0u32;
    for block in blocks {
        match block {
            BlockNode::Heading { level, text } => {
                ordinal = 0;
                lines.push(format!("{} {text}", "#".repeat(*level as usize)));
            }
            BlockNode::ListItem { ordered: true, text } => {
                ordinal += 1;
                lines.push(format!("{ordinal}. {text}"));
            }
            BlockNode::ListItem {
                ordered: false,
                text,
            } => {
                ordinal = 0;
                lines.push(format!("- {text}"));
            }
            BlockNode::Paragraph { runs } => {
                ordinal = 0;
                let mut line = String::new();
                for run in runs {
                    if run.bold {
                        line.push_str("**");
                        line.push_str(&run.text);
                        line.push_str("**");
                    } else {
                        line.push_str(&run.text);
                    }
                }
                lines.push(line);
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> TextRun {
        TextRun {
            text: text.to_string(),
            bold: false,
        }
    }

    fn bold(text: &str) -> TextRun {
        TextRun {
            text: text.to_string(),
            bold: true,
        }
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(
            to_blocks("# Title"),
            vec![BlockNode::Heading {
                level: 1,
                text: "Title".to_string()
            }]
        );
        assert_eq!(
            to_blocks("### Deep"),
            vec![BlockNode::Heading {
                level: 3,
                text: "Deep".to_string()
            }]
        );
    }

    #[test]
    fn test_four_hashes_is_a_paragraph() {
        assert_eq!(
            to_blocks("#### nope"),
            vec![BlockNode::Paragraph {
                runs: vec![plain("#### nope")]
            }]
        );
    }

    #[test]
    fn test_hash_without_space_is_a_paragraph() {
        assert_eq!(
            to_blocks("#hashtag"),
            vec![BlockNode::Paragraph {
                runs: vec![plain("#hashtag")]
            }]
        );
    }

    #[test]
    fn test_heading_emphasis_is_flattened() {
        assert_eq!(
            to_blocks("# A **big** day"),
            vec![BlockNode::Heading {
                level: 1,
                text: "A **big** day".to_string()
            }]
        );
    }

    #[test]
    fn test_unordered_list_markers() {
        assert_eq!(
            to_blocks("- item"),
            vec![BlockNode::ListItem {
                ordered: false,
                text: "item".to_string()
            }]
        );
        assert_eq!(
            to_blocks("* item"),
            vec![BlockNode::ListItem {
                ordered: false,
                text: "item".to_string()
            }]
        );
    }

    #[test]
    fn test_ordered_list_marker() {
        assert_eq!(
            to_blocks("1. item"),
            vec![BlockNode::ListItem {
                ordered: true,
                text: "item".to_string()
            }]
        );
        assert_eq!(
            to_blocks("12. item"),
            vec![BlockNode::ListItem {
                ordered: true,
                text: "item".to_string()
            }]
        );
    }

    #[test]
    fn test_digit_dot_without_space_is_a_paragraph() {
        assert_eq!(
            to_blocks("1.5 servings"),
            vec![BlockNode::Paragraph {
                runs: vec![plain("1.5 servings")]
            }]
        );
    }

    #[test]
    fn test_paragraph_with_bold_runs() {
        assert_eq!(
            to_blocks("plain **bold** text"),
            vec![BlockNode::Paragraph {
                runs: vec![plain("plain "), bold("bold"), plain(" text")]
            }]
        );
    }

    #[test]
    fn test_unterminated_emphasis_is_literal() {
        assert_eq!(bold_runs("**oops"), vec![plain("**oops")]);
    }

    #[test]
    fn test_empty_emphasis_is_literal() {
        assert_eq!(bold_runs("****"), vec![plain("****")]);
    }

    #[test]
    fn test_adjacent_bold_spans() {
        assert_eq!(
            bold_runs("**a****b**"),
            vec![bold("a"), bold("b")],
        );
    }

    #[test]
    fn test_bold_at_line_edges() {
        assert_eq!(bold_runs("**lead** rest"), vec![bold("lead"), plain(" rest")]);
        assert_eq!(bold_runs("rest **tail**"), vec![plain("rest "), bold("tail")]);
    }

    #[test]
    fn test_blank_lines_produce_no_blocks() {
        let blocks = to_blocks("\n\n- a\n\n- b\n\n");
        assert_eq!(
            blocks,
            vec![
                BlockNode::ListItem {
                    ordered: false,
                    text: "a".to_string()
                },
                BlockNode::ListItem {
                    ordered: false,
                    text: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let text = "# T\n\n1. one\n2. two\nbody **x** tail\n- u\n";
        assert_eq!(to_blocks(text), to_blocks(text));
    }

    #[test]
    fn test_render_round_trip() {
        let source = "# Heading\n## Sub\n1. first\n2. second\n- bullet\nplain **bold** text\n**lead** and tail";
        let blocks = to_blocks(source);
        let rendered = render_blocks(&blocks);
        assert_eq!(to_blocks(&rendered), blocks);
    }

    #[test]
    fn test_render_numbers_ordered_items_sequentially() {
        let blocks = vec![
            BlockNode::ListItem {
                ordered: true,
                text: "one".to_string(),
            },
            BlockNode::ListItem {
                ordered: true,
                text: "two".to_string(),
            },
        ];
        assert_eq!(render_blocks(&blocks), "1. one\n2. two");
    }
}
