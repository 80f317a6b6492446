//! The generated bundle as a list of text segments
//!
//! Segments copied from a module keep the byte offset they came from, which
//! is all the source map needs. Synthetic text (wrappers, export blocks,
//! rewritten identifiers) has no origin.

use std::fmt;

use crate::{
    source_patch::{Chunk, SourcePatch},
    types::ModuleId,
};

/// Where a segment's first byte was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub module: ModuleId,
    pub offset: usize,
}

impl Origin {
    fn advanced(self, bytes: usize) -> Self {
        Self {
            module: self.module,
            offset: self.offset + bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub origin: Option<Origin>,
}

#[derive(Debug, Clone, Default)]
pub struct Output {
    segments: Vec<Segment>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|segment| segment.text.is_empty())
    }

    /// Append synthetic text
    pub fn append(&mut self, text: &str) {
        if !text.is_empty() {
            self.segments.push(Segment {
                text: text.to_owned(),
                origin: None,
            });
        }
    }

    /// Insert synthetic text before everything else
    pub fn prepend(&mut self, text: &str) {
        if !text.is_empty() {
            self.segments.insert(
                0,
                Segment {
                    text: text.to_owned(),
                    origin: None,
                },
            );
        }
    }

    /// Append the rendered chunks of a patched statement
    pub fn append_patch(&mut self, module: ModuleId, patch: &SourcePatch<'_>) {
        for chunk in patch.chunks() {
            match chunk {
                Chunk::Original { start, text } => self.segments.push(Segment {
                    text: text.to_owned(),
                    origin: Some(Origin {
                        module,
                        offset: start,
                    }),
                }),
                Chunk::Inserted(text) => self.append(text),
            }
        }
    }

    /// Strip leading and trailing whitespace
    pub fn trim(&mut self) {
        self.trim_start();
        self.trim_end();
    }

    fn trim_start(&mut self) {
        let mut drop = 0;
        for segment in &mut self.segments {
            let trimmed = segment.text.trim_start();
            let removed = segment.text.len() - trimmed.len();
            if trimmed.is_empty() {
                drop += 1;
                continue;
            }
            segment.text = trimmed.to_owned();
            segment.origin = segment.origin.map(|origin| origin.advanced(removed));
            break;
        }
        self.segments.drain(..drop);
    }

    fn trim_end(&mut self) {
        while let Some(segment) = self.segments.last_mut() {
            let kept = segment.text.trim_end().len();
            if kept == 0 {
                self.segments.pop();
                continue;
            }
            segment.text.truncate(kept);
            break;
        }
    }

    /// Prefix every non-empty line with `indent`
    pub fn indent(&mut self, indent: &str) {
        let mut indented = Vec::with_capacity(self.segments.len() * 2);
        let mut at_line_start = true;

        for segment in self.segments.drain(..) {
            let mut consumed = 0;
            for piece in segment.text.split_inclusive('\n') {
                let is_blank = piece.trim_end_matches(['\r', '\n']).is_empty();
                if at_line_start && !is_blank {
                    indented.push(Segment {
                        text: indent.to_owned(),
                        origin: None,
                    });
                }
                indented.push(Segment {
                    text: piece.to_owned(),
                    origin: segment.origin.map(|origin| origin.advanced(consumed)),
                });
                consumed += piece.len();
                at_line_start = piece.ends_with('\n');
            }
        }
        self.segments = indented;
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str(&segment.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_keeps_origins_aligned() {
        let mut output = Output::new();
        output.append("\n\n");
        output.append_patch(
            ModuleId::new(0),
            &SourcePatch::new("  var a = 1;  ", 0, 14),
        );
        output.append("\n");
        output.trim();

        assert_eq!(output.to_string(), "var a = 1;");
        assert_eq!(output.segments().len(), 1);
        assert_eq!(
            output.segments()[0].origin,
            Some(Origin {
                module: ModuleId::new(0),
                offset: 2
            })
        );
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        let mut output = Output::new();
        output.append("var a = 1;\n\nfunction f() {\n\treturn a;\n}");
        output.indent("\t");
        assert_eq!(
            output.to_string(),
            "\tvar a = 1;\n\n\tfunction f() {\n\t\treturn a;\n\t}"
        );
    }

    #[test]
    fn test_indent_splits_original_segments() {
        let source = "a();\nb();";
        let mut output = Output::new();
        output.append_patch(ModuleId::new(3), &SourcePatch::new(source, 0, source.len()));
        output.indent("  ");

        let origins: Vec<_> = output
            .segments()
            .iter()
            .filter_map(|segment| segment.origin.map(|origin| origin.offset))
            .collect();
        assert_eq!(origins, vec![0, 5]);
        assert_eq!(output.to_string(), "  a();\n  b();");
    }
}
