//! Parsing module sources into an swc AST plus a flat comment list
//!
//! Spans produced by the lexer start at `BytePos(1)`; [`offset`] converts
//! them back into byte offsets of the original source.

use log::trace;
use swc_core::{
    common::{
        BytePos, Span, Spanned,
        comments::{CommentKind, SingleThreadedComments},
    },
    ecma::{
        ast::{EsVersion, Module},
        parser::{Parser, StringInput, Syntax, lexer::Lexer},
    },
};

use crate::error::{BundleError, Location, Result};

/// A comment found anywhere in a module, with byte offsets into its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    /// `/* */` rather than `//`
    pub block: bool,
    /// Text between the delimiters
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl CommentRecord {
    /// Render the comment back to source form
    pub fn render(&self) -> String {
        if self.block {
            format!("/*{}*/", self.text)
        } else {
            format!("//{}", self.text)
        }
    }
}

#[derive(Debug)]
pub struct ParsedModule {
    pub ast: Module,
    /// All comments, ordered by start offset
    pub comments: Vec<CommentRecord>,
}

/// Convert a lexer position into a byte offset of the parsed source
#[inline]
pub fn offset(pos: BytePos) -> usize {
    pos.0.saturating_sub(1) as usize
}

/// Byte range covered by `span`
#[inline]
pub fn span_range(span: Span) -> (usize, usize) {
    (offset(span.lo), offset(span.hi))
}

/// Parse `source` as an ECMAScript module
pub fn parse_module(id: &str, source: &str) -> Result<ParsedModule> {
    let comments = SingleThreadedComments::default();
    let parse_error = |span: Span, message: String| BundleError::Parse {
        id: id.to_owned(),
        location: Location::from_offset(source, offset(span.lo)),
        message,
    };

    let ast = {
        let end = BytePos(1 + source.len() as u32);
        let lexer = Lexer::new(
            Syntax::Es(Default::default()),
            EsVersion::EsNext,
            StringInput::new(source, BytePos(1), end),
            Some(&comments),
        );
        let mut parser = Parser::new_from(lexer);

        let ast = parser
            .parse_module()
            .map_err(|err| parse_error(err.span(), err.kind().msg().to_string()))?;

        // Recoverable errors are still fatal for bundling
        if let Some(err) = parser.take_errors().into_iter().next() {
            return Err(parse_error(err.span(), err.kind().msg().to_string()));
        }
        ast
    };

    let (leading, trailing) = comments.take_all();
    let mut records = Vec::new();
    for map in [leading, trailing] {
        let map = map.borrow();
        for comment in map.values().flatten() {
            let (start, end) = span_range(comment.span);
            records.push(CommentRecord {
                block: comment.kind == CommentKind::Block,
                text: comment.text.to_string(),
                start,
                end,
            });
        }
    }
    records.sort_by_key(|record| record.start);
    records.dedup_by_key(|record| record.start);

    trace!("Parsed {id}: {} items, {} comments", ast.body.len(), records.len());

    Ok(ParsedModule {
        ast,
        comments: records,
    })
}
