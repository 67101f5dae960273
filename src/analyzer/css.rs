//! Structured feature-usage extraction for style sheets
//!
//! Code Quality Principle: Specialized Analysis Services - the style sheet scanner understands CSS syntax
//! - cssparser tokenizes the source; comments and whitespace are skipped
//! - A walker follows rule/declaration structure (including nesting) and emits feature keys
//! - Input the tokenizer would silently recover from is rejected with a position
//! - The extractor reports every usage; judging them is the aggregator's job

use crate::analyzer::{Confidence, FileKind, UsageScanner};
use crate::domain::violations::{BaselineError, BaselineResult, UsageCandidate};
use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, SourceLocation, Token};
use std::path::Path;

/// A feature usage reported by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUsage {
    pub feature_id: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Style sheet could not be understood
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ExtractError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Enumerates feature usages in style sheet source text
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, source: &str) -> Result<Vec<ExtractedUsage>, ExtractError>;
}

/// Built-in syntax-aware CSS extractor emitting browser-compat-data keys
///
/// It applies no browser support filtering of its own: every usage is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssFeatureExtractor;

impl FeatureExtractor for CssFeatureExtractor {
    fn extract(&self, source: &str) -> Result<Vec<ExtractedUsage>, ExtractError> {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        let mut walker = Walker {
            source_len: source.len(),
            usages: Vec::new(),
        };
        walker.walk_rules(&mut parser, false)?;
        Ok(walker.usages)
    }
}

/// Scanner for `.css` files backed by a [`FeatureExtractor`]
pub struct StyleSheetScanner {
    extractor: Box<dyn FeatureExtractor>,
}

impl StyleSheetScanner {
    pub fn new() -> Self {
        Self::with_extractor(CssFeatureExtractor)
    }

    /// Use a different extractor implementation
    pub fn with_extractor<E: FeatureExtractor + 'static>(extractor: E) -> Self {
        Self {
            extractor: Box::new(extractor),
        }
    }
}

impl Default for StyleSheetScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageScanner for StyleSheetScanner {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        FileKind::of(file_path) == FileKind::StyleSheet
    }

    fn scan(&self, file_path: &Path, content: &str) -> BaselineResult<Vec<UsageCandidate>> {
        let usages = self.extractor.extract(content).map_err(|e| {
            BaselineError::file_scan(file_path.display().to_string(), e.to_string())
        })?;

        Ok(usages
            .into_iter()
            .map(|usage| {
                UsageCandidate::new(usage.feature_id, file_path)
                    .with_position(usage.line, usage.column)
            })
            .collect())
    }
}

type Failure<'i> = ParseError<'i, String>;

fn failure<'i>(message: &str, location: SourceLocation) -> Failure<'i> {
    ParseError {
        kind: ParseErrorKind::Custom(message.to_string()),
        location,
    }
}

impl From<Failure<'_>> for ExtractError {
    fn from(error: Failure<'_>) -> Self {
        let message = match error.kind {
            ParseErrorKind::Custom(message) => message,
            ParseErrorKind::Basic(kind) => format!("{kind:?}"),
        };
        Self {
            message,
            line: error.location.line + 1,
            column: error.location.column,
        }
    }
}

/// Token shape the walker cares about
#[derive(Debug, Clone, PartialEq, Eq)]
enum PieceKind {
    Ident(String),
    AtKeyword(String),
    Function(String),
    Colon,
    OpenParen,
    OpenBracket,
    CloseParen,
    CloseBracket,
    Delim(char),
    Other,
}

impl PieceKind {
    fn of(token: &Token<'_>) -> Self {
        match token {
            Token::Ident(name) => Self::Ident(name.to_string()),
            Token::AtKeyword(name) => Self::AtKeyword(name.to_ascii_lowercase()),
            Token::Colon => Self::Colon,
            Token::Delim(c) => Self::Delim(*c),
            _ => Self::Other,
        }
    }

    /// Name carried by identifier-like pieces
    fn name(&self) -> Option<&str> {
        match self {
            Self::Ident(name) | Self::Function(name) => Some(name),
            _ => None,
        }
    }

    fn opens(&self) -> bool {
        matches!(self, Self::OpenParen | Self::OpenBracket | Self::Function(_))
    }

    fn closes(&self) -> bool {
        matches!(self, Self::CloseParen | Self::CloseBracket)
    }
}

/// A positioned token; nested blocks are flattened between open and close pieces
#[derive(Debug, Clone)]
struct Piece {
    kind: PieceKind,
    line: u32,
    column: u32,
}

impl Piece {
    fn new(kind: PieceKind, location: SourceLocation) -> Self {
        Self {
            kind,
            line: location.line + 1,
            column: location.column,
        }
    }
}

/// How a statement ended
enum StatementEnd {
    Semicolon,
    Block(SourceLocation),
    Eof,
}

/// At-rules whose preludes carry media-feature style descriptors
const DESCRIPTOR_AT_RULES: &[&str] = &["media", "container", "custom-media"];

/// Whether `raw` ends with an unescaped `closer`
fn closed_by(raw: &str, closer: char) -> bool {
    let Some(body) = raw.strip_suffix(closer) else {
        return false;
    };
    body.chars().rev().take_while(|c| *c == '\\').count() % 2 == 0
}

/// Next significant token and where it starts; `None` at the end of the current block
///
/// The tokenizer recovers from unterminated comments, strings and URLs at end of
/// input, so those are detected from the raw source slice.
fn next_token<'i>(
    p: &mut Parser<'i, '_>,
) -> Result<Option<(Token<'i>, SourceLocation)>, Failure<'i>> {
    loop {
        let location = p.current_source_location();
        let start = p.position();
        let token = match p.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(None),
        };
        let raw = p.slice_from(start);

        match token {
            Token::WhiteSpace(_) => {}
            Token::Comment(_) => {
                if raw.len() < 4 || !raw.ends_with("*/") {
                    return Err(failure("unterminated comment", location));
                }
            }
            Token::QuotedString(_) => {
                let quote = raw.chars().next().unwrap_or('"');
                if raw.len() < 2 || !closed_by(raw, quote) {
                    return Err(failure("unterminated string", location));
                }
                return Ok(Some((token, location)));
            }
            Token::BadString(_) => return Err(failure("unterminated string", location)),
            Token::UnquotedUrl(_) if !closed_by(raw, ')') => {
                return Err(failure("unterminated url()", location))
            }
            Token::BadUrl(_) => return Err(failure("malformed url()", location)),
            token => return Ok(Some((token, location))),
        }
    }
}

struct Walker {
    source_len: usize,
    usages: Vec<ExtractedUsage>,
}

impl Walker {
    fn emit(&mut self, feature_id: String, at: &Piece) {
        self.usages.push(ExtractedUsage {
            feature_id,
            line: Some(at.line),
            column: Some(at.column),
        });
    }

    /// Where the closing token of the current block sits, or `None` if input ran out first
    fn closer(&self, p: &Parser<'_, '_>) -> Option<SourceLocation> {
        (p.position().byte_index() < self.source_len).then(|| p.current_source_location())
    }

    /// Walk a rule list, at top level or inside a `{}` block
    fn walk_rules<'i>(
        &mut self,
        p: &mut Parser<'i, '_>,
        nested: bool,
    ) -> Result<Option<SourceLocation>, Failure<'i>> {
        loop {
            let (statement, end) = self.collect_statement(p)?;

            match statement.first().map(|piece| &piece.kind) {
                Some(PieceKind::AtKeyword(name)) => {
                    self.emit(format!("css.at-rules.{name}"), &statement[0]);
                    self.at_rule_prelude(name, &statement[1..]);
                }
                Some(_) if matches!(end, StatementEnd::Block(_)) => self.selector(&statement),
                Some(_) if nested => self.declaration(&statement),
                _ => {}
            }

            match end {
                StatementEnd::Block(brace) => {
                    let closed = p.parse_nested_block(|p| self.walk_rules(p, true))?;
                    if closed.is_none() {
                        return Err(failure("unclosed '{'", brace));
                    }
                }
                StatementEnd::Semicolon => {}
                StatementEnd::Eof => return Ok(self.closer(p)),
            }
        }
    }

    /// Collect pieces up to `;` or `{` outside parentheses and brackets
    fn collect_statement<'i>(
        &self,
        p: &mut Parser<'i, '_>,
    ) -> Result<(Vec<Piece>, StatementEnd), Failure<'i>> {
        let mut pieces = Vec::new();

        while let Some((token, location)) = next_token(p)? {
            match token {
                Token::Semicolon => return Ok((pieces, StatementEnd::Semicolon)),
                Token::CurlyBracketBlock => return Ok((pieces, StatementEnd::Block(location))),
                Token::CloseCurlyBracket => return Err(failure("unexpected '}'", location)),
                token => self.push_piece(p, token, location, &mut pieces)?,
            }
        }

        Ok((pieces, StatementEnd::Eof))
    }

    /// Collect the content of a `()`, `[]` or function block
    fn collect_content<'i>(
        &self,
        p: &mut Parser<'i, '_>,
        opener: SourceLocation,
        pieces: &mut Vec<Piece>,
    ) -> Result<Option<SourceLocation>, Failure<'i>> {
        while let Some((token, location)) = next_token(p)? {
            match token {
                Token::CloseCurlyBracket => {
                    return Err(failure("unclosed parenthesis or bracket", opener))
                }
                token => self.push_piece(p, token, location, pieces)?,
            }
        }

        Ok(self.closer(p))
    }

    fn push_piece<'i>(
        &self,
        p: &mut Parser<'i, '_>,
        token: Token<'i>,
        location: SourceLocation,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Failure<'i>> {
        let (open, close) = match token {
            Token::Function(name) => (
                PieceKind::Function(name.to_ascii_lowercase()),
                PieceKind::CloseParen,
            ),
            Token::ParenthesisBlock => (PieceKind::OpenParen, PieceKind::CloseParen),
            Token::SquareBracketBlock => (PieceKind::OpenBracket, PieceKind::CloseBracket),
            Token::CurlyBracketBlock => {
                let closed =
                    p.parse_nested_block(|p| self.collect_content(p, location, &mut Vec::new()))?;
                return match closed {
                    Some(_) => Ok(()),
                    None => Err(failure("unclosed '{'", location)),
                };
            }
            Token::CloseParenthesis | Token::CloseSquareBracket => {
                return Err(failure("unbalanced parentheses or brackets", location))
            }
            Token::UnquotedUrl(_) => {
                pieces.push(Piece::new(PieceKind::Function("url".to_string()), location));
                pieces.push(Piece::new(PieceKind::CloseParen, location));
                return Ok(());
            }
            token => {
                pieces.push(Piece::new(PieceKind::of(&token), location));
                return Ok(());
            }
        };

        pieces.push(Piece::new(open, location));
        let closed = p.parse_nested_block(|p| self.collect_content(p, location, pieces))?;
        match closed {
            Some(end) => {
                pieces.push(Piece::new(close, end));
                Ok(())
            }
            None => Err(failure("unclosed parenthesis or bracket", location)),
        }
    }

    fn at_rule_prelude(&mut self, rule: &str, prelude: &[Piece]) {
        if !DESCRIPTOR_AT_RULES.contains(&rule) {
            return;
        }

        for (i, piece) in prelude.iter().enumerate() {
            if piece.kind != PieceKind::OpenParen {
                continue;
            }
            let children = direct_children(&prelude[i + 1..]);
            let range = children
                .iter()
                .any(|c| matches!(c.kind, PieceKind::Delim('<' | '>' | '=')));

            let descriptor = if range {
                children
                    .iter()
                    .find(|c| matches!(c.kind, PieceKind::Ident(_)))
                    .copied()
            } else {
                match children.as_slice() {
                    [name, colon, ..] if colon.kind == PieceKind::Colon => Some(*name),
                    _ => None,
                }
            };
            let Some(name) = descriptor else { continue };
            let PieceKind::Ident(descriptor) = &name.kind else {
                continue;
            };

            self.emit(
                format!("css.at-rules.{rule}.{}", descriptor.to_ascii_lowercase()),
                name,
            );
            if range {
                self.emit(format!("css.at-rules.{rule}.range_syntax"), name);
            }
        }
    }

    fn selector(&mut self, prelude: &[Piece]) {
        let mut i = 0;
        while i < prelude.len() {
            let piece = &prelude[i];
            match piece.kind {
                PieceKind::Colon => {
                    let name_at = match prelude.get(i + 1) {
                        Some(next) if next.kind == PieceKind::Colon => i + 2,
                        _ => i + 1,
                    };
                    if let Some(name) = prelude.get(name_at).and_then(|p| p.kind.name()) {
                        self.emit(
                            format!("css.selectors.{}", name.to_ascii_lowercase()),
                            piece,
                        );
                    }
                    i = name_at;
                }
                PieceKind::Delim('&') => {
                    self.emit("css.selectors.nesting".to_string(), piece);
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }

    fn declaration(&mut self, statement: &[Piece]) {
        let [name_piece, colon, value @ ..] = statement else {
            return;
        };
        let (PieceKind::Ident(name), PieceKind::Colon) = (&name_piece.kind, &colon.kind) else {
            return;
        };

        if name.starts_with("--") {
            self.emit("css.properties.custom-property".to_string(), name_piece);
            return;
        }

        let property = name.to_ascii_lowercase();
        self.emit(format!("css.properties.{property}"), name_piece);

        let mut depth = 0usize;
        let mut after_bang = false;
        for piece in value {
            match &piece.kind {
                PieceKind::Function(function) => {
                    self.emit(format!("css.types.{function}"), piece);
                    depth += 1;
                }
                kind if kind.opens() => depth += 1,
                kind if kind.closes() => depth = depth.saturating_sub(1),
                PieceKind::Ident(keyword)
                    if depth == 0 && !after_bang && !keyword.starts_with("--") =>
                {
                    self.emit(
                        format!("css.properties.{property}.{}", keyword.to_ascii_lowercase()),
                        piece,
                    );
                }
                _ => {}
            }
            after_bang = piece.kind == PieceKind::Delim('!');
        }
    }
}

/// Pieces directly inside a block, given the pieces that follow its opener
fn direct_children(pieces: &[Piece]) -> Vec<&Piece> {
    let mut children = Vec::new();
    let mut depth = 0usize;

    for piece in pieces {
        if piece.kind.closes() {
            if depth == 0 {
                break;
            }
            depth -= 1;
            continue;
        }
        if depth == 0 {
            children.push(piece);
        }
        if piece.kind.opens() {
            depth += 1;
        }
    }

    children
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Vec<(String, u32, u32)> {
        CssFeatureExtractor
            .extract(source)
            .unwrap()
            .into_iter()
            .map(|u| (u.feature_id, u.line.unwrap(), u.column.unwrap()))
            .collect()
    }

    fn ids(source: &str) -> Vec<String> {
        extract(source).into_iter().map(|(id, _, _)| id).collect()
    }

    #[test]
    fn test_declarations_and_keywords() {
        let usages = extract(".grid {\n  display: grid;\n  gap: 1rem;\n}\n");
        assert_eq!(
            usages,
            vec![
                ("css.properties.display".to_string(), 2, 3),
                ("css.properties.display.grid".to_string(), 2, 12),
                ("css.properties.gap".to_string(), 3, 3),
            ]
        );
    }

    #[test]
    fn test_at_rules_and_descriptors() {
        let found = ids(
            "@container sidebar (min-width: 400px) { .card { color: red } }\n\
             @media (prefers-color-scheme: dark) and (width >= 600px) {}",
        );
        assert_eq!(
            found,
            vec![
                "css.at-rules.container",
                "css.at-rules.container.min-width",
                "css.properties.color",
                "css.properties.color.red",
                "css.at-rules.media",
                "css.at-rules.media.prefers-color-scheme",
                "css.at-rules.media.width",
                "css.at-rules.media.range_syntax",
            ]
        );
    }

    #[test]
    fn test_range_syntax_with_leading_value() {
        let usages = extract("@media (400px <= width <= 700px) {}");
        assert_eq!(
            usages,
            vec![
                ("css.at-rules.media".to_string(), 1, 1),
                ("css.at-rules.media.width".to_string(), 1, 18),
                ("css.at-rules.media.range_syntax".to_string(), 1, 18),
            ]
        );
    }

    #[test]
    fn test_nested_condition_descriptors() {
        let found = ids("@container card (not (inline-size < 30em)) {}");
        assert_eq!(
            found,
            vec![
                "css.at-rules.container",
                "css.at-rules.container.inline-size",
                "css.at-rules.container.range_syntax",
            ]
        );
    }

    #[test]
    fn test_unclosed_block_reports_brace_position() {
        let err = CssFeatureExtractor.extract(".a {\n  color: red;").unwrap_err();
        assert_eq!(err.message, "unclosed '{'");
        assert_eq!((err.line, err.column), (1, 4));
    }

    #[test]
    fn test_selectors_and_nesting() {
        let found = ids("a:hover, p::first-line {}\n.card { &:has(> img) { margin: 0 } }");
        assert_eq!(
            found,
            vec![
                "css.selectors.hover",
                "css.selectors.first-line",
                "css.selectors.nesting",
                "css.selectors.has",
                "css.properties.margin",
            ]
        );
    }

    #[test]
    fn test_functions_custom_properties_and_important() {
        let found = ids(
            ":root { --gap: 4px; }\n\
             .x { width: clamp(1rem, 2vw, 3rem) !important; color: var(--accent); }",
        );
        assert_eq!(
            found,
            vec![
                "css.selectors.root",
                "css.properties.custom-property",
                "css.properties.width",
                "css.types.clamp",
                "css.properties.color",
                "css.types.var",
            ]
        );
    }

    #[test]
    fn test_comments_strings_and_urls_are_ignored() {
        let found = ids(
            "/* display: grid; */\n\
             .a { content: \"gap: 1px\"; background: url(data:image/png;base64,AAA=); }",
        );
        assert_eq!(
            found,
            vec![
                "css.properties.content",
                "css.properties.background",
                "css.types.url",
            ]
        );
    }

    #[test]
    fn test_malformed_style_sheets() {
        let cases = [
            ("/* never closed", "unterminated comment"),
            (".a { content: \"oops }", "unterminated string"),
            (".a { color: red;", "unclosed '{'"),
            ("}", "unexpected '}'"),
            (".a { width: calc(1px + 2px; }", "unclosed parenthesis or bracket"),
            (".a { width: calc(min(1px, 2px)", "unclosed parenthesis or bracket"),
            (".a { margin: 0 ) }", "unbalanced parentheses or brackets"),
        ];

        for (source, expected) in cases {
            let err = CssFeatureExtractor.extract(source).unwrap_err();
            assert!(err.message.contains(expected), "{source}: {err}");
        }
    }

    #[test]
    fn test_scanner_reports_scan_error_with_path() {
        let scanner = StyleSheetScanner::new();
        let err = scanner
            .scan(Path::new("broken.css"), "a { color: red")
            .unwrap_err();
        assert!(matches!(err, BaselineError::FileScan { ref file, .. } if file == "broken.css"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_scanner_handles_css_only() {
        let scanner = StyleSheetScanner::new();
        assert!(scanner.handles_file(Path::new("styles/site.css")));
        assert!(scanner.handles_file(Path::new("styles/SITE.CSS")));
        assert!(!scanner.handles_file(Path::new("app.js")));
    }
}
