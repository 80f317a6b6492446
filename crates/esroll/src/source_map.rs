//! Source maps for generated bundles
//!
//! Mappings are emitted at the start of every original segment and at every
//! line start inside one, which gives line-accurate maps without tracking
//! individual tokens.

use rustc_hash::FxHashMap;
use sourcemap::{SourceMap, SourceMapBuilder};

use crate::{module::Module, output::Output, types::ModuleId};

/// Line start offsets of one module source
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self { source, starts }
    }

    /// 0-based line and UTF-16 column of a byte offset
    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.starts[line];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(0, |text| text.encode_utf16().count());
        (line as u32, column as u32)
    }
}

/// Forward slashes only, so maps are identical across platforms
pub fn unixize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Map `output` back to the modules its original segments came from
///
/// Sources are the module identities; their contents are inlined.
pub fn build_source_map(output: &Output, modules: &[Module], file: Option<&str>) -> SourceMap {
    let mut builder = SourceMapBuilder::new(file);
    let mut indexes: FxHashMap<ModuleId, LineIndex<'_>> = FxHashMap::default();
    let mut sources: FxHashMap<ModuleId, String> = FxHashMap::default();

    let mut dst_line = 0u32;
    let mut dst_col = 0u32;

    for segment in output.segments() {
        let mut consumed = 0;
        for piece in segment.text.split_inclusive('\n') {
            let content = piece.trim_end_matches(['\r', '\n']);
            if let Some(origin) = segment.origin
                && !content.is_empty()
            {
                let module = &modules[origin.module.index()];
                let index = indexes
                    .entry(origin.module)
                    .or_insert_with(|| LineIndex::new(&module.source));
                let (src_line, src_col) = index.position(origin.offset + consumed);
                let source = sources
                    .entry(origin.module)
                    .or_insert_with(|| unixize_path(&module.id));

                let token = builder.add(
                    dst_line,
                    dst_col,
                    src_line,
                    src_col,
                    Some(source.as_str()),
                    None,
                    false,
                );
                if !builder.has_source_contents(token.src_id) {
                    builder.set_source_contents(token.src_id, Some(&module.source));
                }
            }

            consumed += piece.len();
            if piece.ends_with('\n') {
                dst_line += 1;
                dst_col = 0;
            } else {
                dst_col += piece.encode_utf16().count() as u32;
            }
        }
    }

    builder.into_sourcemap()
}
