//! Non-destructive text patching over a range of an immutable source
//!
//! Edits are addressed by byte offsets of the original text, so any number
//! of rewrites can be layered without recomputing positions. Rendering walks
//! the edits in order and yields chunks that remember which bytes came from
//! the original, which is what source maps are built from.

use std::fmt;

use log::warn;

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    content: String,
}

/// A piece of rendered output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk<'a> {
    /// Unmodified original text starting at byte `start`
    Original { start: usize, text: &'a str },
    /// Synthetic text with no original position
    Inserted(&'a str),
}

#[derive(Debug, Clone)]
pub struct SourcePatch<'a> {
    original: &'a str,
    start: usize,
    end: usize,
    intro: String,
    outro: String,
    edits: Vec<Edit>,
}

impl<'a> SourcePatch<'a> {
    /// Patch over `original[start..end]`
    pub fn new(original: &'a str, start: usize, end: usize) -> Self {
        Self {
            original,
            start,
            end,
            intro: String::new(),
            outro: String::new(),
            edits: Vec::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Replace `original[start..end]` with `content`
    ///
    /// Overwriting the exact same range again replaces the earlier content.
    pub fn overwrite(&mut self, start: usize, end: usize, content: impl Into<String>) {
        let content = content.into();
        if let Some(edit) = self
            .edits
            .iter_mut()
            .find(|edit| edit.start == start && edit.end == end && start != end)
        {
            edit.content = content;
            return;
        }
        self.edits.push(Edit {
            start,
            end,
            content,
        });
    }

    pub fn remove(&mut self, start: usize, end: usize) {
        self.overwrite(start, end, "");
    }

    /// Insert `content` at original offset `pos`; an offset at or past the
    /// end of the range appends instead
    pub fn insert(&mut self, pos: usize, content: &str) {
        if pos >= self.end {
            self.append(content);
            return;
        }
        self.edits.push(Edit {
            start: pos,
            end: pos,
            content: content.to_owned(),
        });
    }

    pub fn prepend(&mut self, content: &str) {
        self.intro.insert_str(0, content);
    }

    pub fn append(&mut self, content: &str) {
        self.outro.push_str(content);
    }

    /// Drop anything previously prepended
    pub fn clear_intro(&mut self) {
        self.intro.clear();
    }

    /// Rendered output split into original and synthetic chunks
    pub fn chunks(&self) -> Vec<Chunk<'_>> {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| (edit.start, edit.end));

        let mut chunks = Vec::with_capacity(edits.len() * 2 + 3);
        if !self.intro.is_empty() {
            chunks.push(Chunk::Inserted(&self.intro));
        }

        let mut cursor = self.start;
        for edit in edits {
            // Overlapping edits lose to the one that starts first
            if edit.start < cursor || edit.end > self.end {
                warn!(
                    "Dropping edit of {}..{} to {:?}: overlaps an earlier edit or leaves {}..{}",
                    edit.start, edit.end, edit.content, self.start, self.end
                );
                continue;
            }
            if edit.start > cursor {
                chunks.push(Chunk::Original {
                    start: cursor,
                    text: &self.original[cursor..edit.start],
                });
            }
            if !edit.content.is_empty() {
                chunks.push(Chunk::Inserted(&edit.content));
            }
            cursor = edit.end;
        }
        if cursor < self.end {
            chunks.push(Chunk::Original {
                start: cursor,
                text: &self.original[cursor..self.end],
            });
        }

        if !self.outro.is_empty() {
            chunks.push(Chunk::Inserted(&self.outro));
        }
        chunks
    }
}

impl fmt::Display for SourcePatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            match chunk {
                Chunk::Original { text, .. } | Chunk::Inserted(text) => f.write_str(text)?,
            }
        }
        Ok(())
    }
}
