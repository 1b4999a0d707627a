//! Recursive-descent parser for the analyzed Go subset.
//!
//! The parser is tolerant: errors are counted and recovered from by
//! synchronizing to the next statement or declaration boundary, so one
//! malformed construct degrades a file rather than losing it. Constructs the
//! analysis does not model parse into `Unsupported` nodes and keep their
//! position, which keeps downstream rendering total.

use std::collections::HashMap;

use crate::ast::{
    Block, CaseClause, ChanDir, Decl, Expr, File, FuncDecl, FuncType, Ident, ImportSpec, LitKind,
    ParamGroup, Pos, Receiver, Stmt, StructField, TypeDecl, TypeSpec, TypeExpr, ValueDecl,
    ValueSpec, InterfaceElem,
};
use crate::scanner::{scan, ScanOutput};
use crate::token::{Token, TokenKind};

/// Parse one source file. Never fails outright; the returned [`File`]
/// carries the count of recovered errors.
pub fn parse_file(file_id: u32, src: &str) -> File {
    let scanned = scan(src);
    Parser::new(file_id, scanned).parse()
}

// ============================================================================
// Parser State
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file_id: u32,
    /// Doc comment groups keyed by the line their last comment is on.
    docs: HashMap<u32, String>,
    embed_patterns: Vec<String>,
    errors: usize,
    /// False while parsing `if`/`for`/`switch` headers, where a bare
    /// `T{` would be ambiguous with the statement body.
    allow_composite: bool,
}

impl Parser {
    fn new(file_id: u32, scanned: ScanOutput) -> Self {
        let docs = scanned
            .comments
            .into_iter()
            .map(|g| (g.end_line, g.text))
            .collect();
        Parser {
            tokens: scanned.tokens,
            pos: 0,
            file_id,
            docs,
            embed_patterns: scanned.embed_patterns,
            errors: scanned.errors.len(),
            allow_composite: true,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.errors += 1;
            false
        }
    }

    fn here(&self) -> Pos {
        Pos::new(self.file_id, self.cur().line)
    }

    /// Doc group ending on the line directly above `line`, if any.
    fn doc_above(&self, line: u32) -> String {
        if line < 2 {
            return String::new();
        }
        self.docs.get(&(line - 1)).cloned().unwrap_or_default()
    }

    /// Skip to the next semicolon or closing brace at the current level.
    fn sync_stmt(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip to the next top-level declaration keyword.
    fn sync_decl(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::Func | TokenKind::Type | TokenKind::Var | TokenKind::Const
                    if depth == 0 =>
                {
                    return;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // File
    // ------------------------------------------------------------------

    fn parse(mut self) -> File {
        let mut package_name = Ident::new("", Pos::NONE);
        if self.expect(TokenKind::Package) {
            if self.at(TokenKind::Ident) {
                let tok = self.bump();
                package_name = Ident::new(tok.text, Pos::new(self.file_id, tok.line));
            } else {
                self.errors += 1;
            }
            self.eat(TokenKind::Semicolon);
        }

        let mut imports = Vec::new();
        while self.at(TokenKind::Import) {
            self.bump();
            if self.eat(TokenKind::LParen) {
                while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                    if self.at(TokenKind::Semicolon) {
                        self.bump();
                        continue;
                    }
                    if let Some(spec) = self.parse_import_spec() {
                        imports.push(spec);
                    } else {
                        self.sync_stmt();
                    }
                }
                self.expect(TokenKind::RParen);
            } else if let Some(spec) = self.parse_import_spec() {
                imports.push(spec);
            }
            self.eat(TokenKind::Semicolon);
        }

        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            match self.kind() {
                TokenKind::Func => {
                    if let Some(decl) = self.parse_func_decl() {
                        decls.push(Decl::Func(decl));
                    }
                }
                TokenKind::Type => decls.push(Decl::Type(self.parse_type_decl())),
                TokenKind::Var => {
                    self.bump();
                    decls.push(Decl::Var(self.parse_value_decl()));
                }
                TokenKind::Const => {
                    self.bump();
                    decls.push(Decl::Const(self.parse_value_decl()));
                }
                TokenKind::Semicolon => {
                    self.bump();
                }
                _ => {
                    self.errors += 1;
                    self.bump();
                    self.sync_decl();
                }
            }
        }

        File {
            file_id: self.file_id,
            package_name,
            imports,
            decls,
            embed_patterns: std::mem::take(&mut self.embed_patterns),
            errors: self.errors,
        }
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let pos = self.here();
        let local_name = match self.kind() {
            TokenKind::Ident => Some(self.bump().text),
            TokenKind::Dot => {
                self.bump();
                Some(".".to_string())
            }
            _ => None,
        };
        if !self.at(TokenKind::Str) {
            self.errors += 1;
            return None;
        }
        let raw = self.bump().text;
        let path = raw.trim_matches(|c| c == '"' || c == '`').to_string();
        Some(ImportSpec {
            local_name,
            path,
            pos,
        })
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_type_decl(&mut self) -> TypeDecl {
        let decl_line = self.cur().line;
        self.bump(); // `type`
        let mut specs = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                if self.at(TokenKind::Semicolon) {
                    self.bump();
                    continue;
                }
                let doc = self.doc_above(self.cur().line);
                if let Some(spec) = self.parse_type_spec(doc) {
                    specs.push(spec);
                } else {
                    self.sync_stmt();
                }
            }
            self.expect(TokenKind::RParen);
        } else {
            let doc = self.doc_above(decl_line);
            if let Some(spec) = self.parse_type_spec(doc) {
                specs.push(spec);
            } else {
                self.sync_stmt();
            }
        }
        self.eat(TokenKind::Semicolon);
        TypeDecl { specs }
    }

    fn parse_type_spec(&mut self, doc: String) -> Option<TypeSpec> {
        if !self.at(TokenKind::Ident) {
            self.errors += 1;
            return None;
        }
        let tok = self.bump();
        let name = Ident::new(tok.text, Pos::new(self.file_id, tok.line));

        let mut type_params = Vec::new();
        if self.at(TokenKind::LBracket) && self.looks_like_type_params() {
            type_params = self.parse_type_params();
        }

        let alias = self.eat(TokenKind::Assign);
        let ty = self.parse_type();
        Some(TypeSpec {
            name,
            doc,
            alias,
            type_params,
            ty,
        })
    }

    /// Disambiguate `type X[T any] ...` from `type X [N]T`.
    fn looks_like_type_params(&self) -> bool {
        match self.peek_kind(1) {
            TokenKind::Ident => !matches!(self.peek_kind(2), TokenKind::RBracket),
            _ => false,
        }
    }

    fn parse_type_params(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        self.bump(); // `[`
        let mut depth = 1usize;
        let mut expect_name = true;
        while depth > 0 && !self.at(TokenKind::Eof) {
            match self.kind() {
                TokenKind::LBracket => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBracket => {
                    depth -= 1;
                    self.bump();
                }
                TokenKind::Comma if depth == 1 => {
                    expect_name = true;
                    self.bump();
                }
                TokenKind::Ident if depth == 1 && expect_name => {
                    names.push(self.bump().text);
                    expect_name = false;
                }
                _ => {
                    self.bump();
                }
            }
        }
        names
    }

    fn parse_value_decl(&mut self) -> ValueDecl {
        let mut specs = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                if self.at(TokenKind::Semicolon) {
                    self.bump();
                    continue;
                }
                if let Some(spec) = self.parse_value_spec() {
                    specs.push(spec);
                } else {
                    self.sync_stmt();
                }
            }
            self.expect(TokenKind::RParen);
        } else if let Some(spec) = self.parse_value_spec() {
            specs.push(spec);
        } else {
            self.sync_stmt();
        }
        self.eat(TokenKind::Semicolon);
        ValueDecl { specs }
    }

    fn parse_value_spec(&mut self) -> Option<ValueSpec> {
        let mut names = Vec::new();
        loop {
            if !self.at(TokenKind::Ident) {
                self.errors += 1;
                return None;
            }
            let tok = self.bump();
            names.push(Ident::new(tok.text, Pos::new(self.file_id, tok.line)));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let ty = if self.starts_type() && !self.at(TokenKind::Assign) {
            Some(self.parse_type())
        } else {
            None
        };
        let mut values = Vec::new();
        if self.eat(TokenKind::Assign) {
            loop {
                values.push(self.parse_expr());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        Some(ValueSpec { names, ty, values })
    }

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let func_line = self.cur().line;
        let doc = self.doc_above(func_line);
        self.bump(); // `func`

        let receiver = if self.at(TokenKind::LParen) {
            self.parse_receiver()
        } else {
            None
        };

        if !self.at(TokenKind::Ident) {
            self.errors += 1;
            self.sync_decl();
            return None;
        }
        let tok = self.bump();
        let name = Ident::new(tok.text, Pos::new(self.file_id, tok.line));

        let mut type_params = Vec::new();
        if self.at(TokenKind::LBracket) {
            type_params = self.parse_type_params();
        }

        let sig = self.parse_signature();
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        self.eat(TokenKind::Semicolon);
        Some(FuncDecl {
            name,
            doc,
            receiver,
            type_params,
            sig,
            body,
        })
    }

    fn parse_receiver(&mut self) -> Option<Receiver> {
        self.bump(); // `(`
        let mut name = None;
        if self.at(TokenKind::Ident)
            && matches!(self.peek_kind(1), TokenKind::Ident | TokenKind::Star)
        {
            name = Some(self.bump().text);
        }
        let pointer = self.eat(TokenKind::Star);
        if !self.at(TokenKind::Ident) {
            self.errors += 1;
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                self.bump();
            }
            self.eat(TokenKind::RParen);
            return None;
        }
        let type_name = self.bump().text;
        // Skip receiver type parameters: `(r List[T])`.
        if self.at(TokenKind::LBracket) {
            let mut depth = 0usize;
            loop {
                match self.kind() {
                    TokenKind::LBracket => {
                        depth += 1;
                        self.bump();
                    }
                    TokenKind::RBracket => {
                        depth -= 1;
                        self.bump();
                        if depth == 0 {
                            break;
                        }
                    }
                    TokenKind::Eof => break,
                    _ => {
                        self.bump();
                    }
                }
            }
        }
        self.expect(TokenKind::RParen);
        Some(Receiver {
            name,
            type_name,
            pointer,
        })
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn starts_type(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Interface
                | TokenKind::Struct
                | TokenKind::LParen
                | TokenKind::Arrow
                | TokenKind::Ellipsis
        )
    }

    fn parse_type(&mut self) -> TypeExpr {
        let pos = self.here();
        match self.kind() {
            TokenKind::Ident => {
                let first = self.bump().text;
                let (qualifier, name) = if self.at(TokenKind::Dot)
                    && self.peek_kind(1) == TokenKind::Ident
                {
                    self.bump();
                    (Some(first), self.bump().text)
                } else {
                    (None, first)
                };
                let base = TypeExpr::Name {
                    qualifier,
                    name,
                    pos,
                };
                if self.at(TokenKind::LBracket) && self.starts_type_at(1) {
                    let args = self.parse_type_args();
                    TypeExpr::Generic {
                        base: Box::new(base),
                        args,
                        pos,
                    }
                } else {
                    base
                }
            }
            TokenKind::Star => {
                self.bump();
                TypeExpr::Pointer {
                    elem: Box::new(self.parse_type()),
                    pos,
                }
            }
            TokenKind::LBracket => {
                self.bump();
                if self.eat(TokenKind::RBracket) {
                    TypeExpr::Slice {
                        elem: Box::new(self.parse_type()),
                        pos,
                    }
                } else {
                    let len = self.capture_until_rbracket();
                    TypeExpr::Array {
                        len,
                        elem: Box::new(self.parse_type()),
                        pos,
                    }
                }
            }
            TokenKind::Map => {
                self.bump();
                self.expect(TokenKind::LBracket);
                let key = self.parse_type();
                self.expect(TokenKind::RBracket);
                let value = self.parse_type();
                TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                    pos,
                }
            }
            TokenKind::Chan => {
                self.bump();
                let dir = if self.eat(TokenKind::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                TypeExpr::Chan {
                    dir,
                    elem: Box::new(self.parse_type()),
                    pos,
                }
            }
            TokenKind::Arrow => {
                self.bump();
                if self.expect(TokenKind::Chan) {
                    TypeExpr::Chan {
                        dir: ChanDir::Recv,
                        elem: Box::new(self.parse_type()),
                        pos,
                    }
                } else {
                    TypeExpr::Unsupported {
                        kind: "recv-chan",
                        pos,
                    }
                }
            }
            TokenKind::Func => {
                self.bump();
                let sig = self.parse_signature();
                TypeExpr::Func {
                    sig: Box::new(sig),
                    pos,
                }
            }
            TokenKind::Struct => {
                self.bump();
                self.expect(TokenKind::LBrace);
                let fields = self.parse_struct_fields();
                TypeExpr::Struct { fields, pos }
            }
            TokenKind::Interface => {
                self.bump();
                self.expect(TokenKind::LBrace);
                let elems = self.parse_interface_elems();
                TypeExpr::Interface { elems, pos }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_type();
                self.expect(TokenKind::RParen);
                TypeExpr::Paren {
                    inner: Box::new(inner),
                    pos,
                }
            }
            TokenKind::Ellipsis => {
                self.bump();
                TypeExpr::Variadic {
                    elem: Box::new(self.parse_type()),
                    pos,
                }
            }
            _ => {
                self.errors += 1;
                self.bump();
                TypeExpr::Unsupported {
                    kind: "unknown",
                    pos,
                }
            }
        }
    }

    fn starts_type_at(&self, ahead: usize) -> bool {
        matches!(
            self.peek_kind(ahead),
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Interface
                | TokenKind::Struct
                | TokenKind::Arrow
        )
    }

    fn parse_type_args(&mut self) -> Vec<TypeExpr> {
        self.bump(); // `[`
        let mut args = Vec::new();
        while !self.at(TokenKind::RBracket) && !self.at(TokenKind::Eof) {
            args.push(self.parse_type());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket);
        args
    }

    /// Capture the source text of an array length up to the matching `]`.
    fn capture_until_rbracket(&mut self) -> String {
        let mut depth = 1usize;
        let mut parts: Vec<String> = Vec::new();
        while depth > 0 && !self.at(TokenKind::Eof) {
            match self.kind() {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        break;
                    }
                }
                _ => {}
            }
            parts.push(self.bump().text);
        }
        parts.join("")
    }

    fn parse_struct_fields(&mut self) -> Vec<StructField> {
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Semicolon) {
                self.bump();
                continue;
            }
            let before = self.pos;
            if let Some(field) = self.parse_struct_field() {
                fields.push(field);
            }
            // Optional tag.
            if self.at(TokenKind::Str) {
                self.bump();
            }
            self.eat(TokenKind::Semicolon);
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        fields
    }

    fn parse_struct_field(&mut self) -> Option<StructField> {
        // Embedded pointer field: `*pkg.T`.
        if self.at(TokenKind::Star) {
            let ty = self.parse_type();
            return Some(StructField {
                names: Vec::new(),
                ty,
            });
        }
        if !self.at(TokenKind::Ident) {
            // Unusual field shape (e.g. interface constraint leftovers).
            let ty = self.parse_type();
            return Some(StructField {
                names: Vec::new(),
                ty,
            });
        }
        // `Name` followed by `.`, `;`, `}` or a tag is an embedded field.
        match self.peek_kind(1) {
            TokenKind::Dot | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Str => {
                let ty = self.parse_type();
                return Some(StructField {
                    names: Vec::new(),
                    ty,
                });
            }
            _ => {}
        }
        let mut names = Vec::new();
        loop {
            if !self.at(TokenKind::Ident) {
                self.errors += 1;
                return None;
            }
            let tok = self.bump();
            names.push(Ident::new(tok.text, Pos::new(self.file_id, tok.line)));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let ty = self.parse_type();
        Some(StructField { names, ty })
    }

    fn parse_interface_elems(&mut self) -> Vec<InterfaceElem> {
        let mut elems = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Semicolon) {
                self.bump();
                continue;
            }
            let doc = self.doc_above(self.cur().line);
            let before = self.pos;
            if self.at(TokenKind::Ident) && self.peek_kind(1) == TokenKind::LParen {
                let tok = self.bump();
                let name = Ident::new(tok.text, Pos::new(self.file_id, tok.line));
                let sig = self.parse_signature();
                elems.push(InterfaceElem::Method { name, sig, doc });
            } else {
                let pos = self.here();
                let mut ty = self.parse_type();
                // Type-set terms (`~int | string`) are kept but not modeled.
                if self.at(TokenKind::Pipe) || matches!(ty, TypeExpr::Unsupported { .. }) {
                    while self.eat(TokenKind::Pipe) {
                        let _ = self.parse_type();
                    }
                    ty = TypeExpr::Unsupported {
                        kind: "type-set",
                        pos,
                    };
                }
                elems.push(InterfaceElem::Embedded { ty, doc });
            }
            self.eat(TokenKind::Semicolon);
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        elems
    }

    // ------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------

    fn parse_signature(&mut self) -> FuncType {
        let params = if self.expect(TokenKind::LParen) {
            self.parse_param_list()
        } else {
            Vec::new()
        };
        let results = if self.at(TokenKind::LParen) {
            self.bump();
            self.parse_param_list_inner()
        } else if self.starts_type() && !self.at(TokenKind::LParen) {
            vec![ParamGroup {
                names: Vec::new(),
                ty: self.parse_type(),
            }]
        } else {
            Vec::new()
        };
        FuncType { params, results }
    }

    fn parse_param_list(&mut self) -> Vec<ParamGroup> {
        self.parse_param_list_inner()
    }

    /// Parse a parenthesized parameter or result list; the opening paren is
    /// already consumed. Resolves Go's named-vs-unnamed ambiguity by
    /// buffering plain names until a type follows without a comma.
    fn parse_param_list_inner(&mut self) -> Vec<ParamGroup> {
        let mut groups = Vec::new();
        let mut pending: Vec<TypeExpr> = Vec::new();
        loop {
            if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                break;
            }
            let entry = self.parse_type();
            if self.eat(TokenKind::Comma) {
                pending.push(entry);
                continue;
            }
            if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                pending.push(entry);
                break;
            }
            // A type follows directly: everything buffered so far (plus
            // `entry`) was a name list.
            pending.push(entry);
            let names: Vec<Ident> = pending
                .drain(..)
                .map(|t| match t {
                    TypeExpr::Name {
                        qualifier: None,
                        name,
                        pos,
                    } => Ident::new(name, pos),
                    other => {
                        self.errors += 1;
                        Ident::new("_", other.pos())
                    }
                })
                .collect();
            let ty = self.parse_type();
            groups.push(ParamGroup { names, ty });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        // Leftover entries are unnamed types, one group each.
        for ty in pending {
            groups.push(ParamGroup {
                names: Vec::new(),
                ty,
            });
        }
        self.expect(TokenKind::RParen);
        groups
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Block {
        let mut stmts = Vec::new();
        self.expect(TokenKind::LBrace);
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        Block { stmts }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.kind() {
            TokenKind::Var => {
                self.bump();
                let decl = self.parse_value_decl();
                Stmt::Var(decl)
            }
            TokenKind::Const => {
                self.bump();
                let decl = self.parse_value_decl();
                Stmt::Const(decl)
            }
            TokenKind::Type => Stmt::Type(self.parse_type_decl()),
            TokenKind::Return => {
                self.bump();
                let mut results = Vec::new();
                if !self.at(TokenKind::Semicolon) && !self.at(TokenKind::RBrace) {
                    loop {
                        results.push(self.parse_expr());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.eat(TokenKind::Semicolon);
                Stmt::Return { results }
            }
            TokenKind::Go => {
                let pos = self.here();
                self.bump();
                let call = self.parse_expr();
                self.eat(TokenKind::Semicolon);
                Stmt::Go { call, pos }
            }
            TokenKind::Defer => {
                let pos = self.here();
                self.bump();
                let call = self.parse_expr();
                self.eat(TokenKind::Semicolon);
                Stmt::Defer { call, pos }
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Goto
            | TokenKind::Fallthrough => {
                let keyword = self.bump().kind;
                if self.at(TokenKind::Ident) {
                    self.bump();
                }
                self.eat(TokenKind::Semicolon);
                Stmt::Branch { keyword }
            }
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            TokenKind::Semicolon => {
                self.bump();
                Stmt::Empty
            }
            TokenKind::Ident
                if self.peek_kind(1) == TokenKind::Colon
                    && self.peek_kind(2) != TokenKind::Assign =>
            {
                let label = self.bump().text;
                self.bump(); // `:`
                let stmt = self.parse_stmt();
                Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                }
            }
            _ => {
                let stmt = self.parse_simple_stmt();
                self.eat(TokenKind::Semicolon);
                stmt
            }
        }
    }

    fn parse_simple_stmt(&mut self) -> Stmt {
        let mut lhs = vec![self.parse_expr()];
        while self.eat(TokenKind::Comma) {
            lhs.push(self.parse_expr());
        }
        match self.kind() {
            TokenKind::Define | TokenKind::Assign | TokenKind::OpAssign => {
                let define = self.at(TokenKind::Define);
                self.bump();
                let mut rhs = Vec::new();
                loop {
                    rhs.push(self.parse_expr());
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                Stmt::Assign { lhs, rhs, define }
            }
            TokenKind::Arrow => {
                self.bump();
                let value = self.parse_expr();
                let chan = lhs.remove(0);
                Stmt::Send { chan, value }
            }
            TokenKind::Inc | TokenKind::Dec => {
                self.bump();
                Stmt::IncDec {
                    expr: lhs.remove(0),
                }
            }
            _ => Stmt::Expr(lhs.remove(0)),
        }
    }

    fn parse_if(&mut self) -> Stmt {
        self.bump(); // `if`
        let saved = self.allow_composite;
        self.allow_composite = false;
        let first = self.parse_simple_stmt();
        let (init, cond) = if self.eat(TokenKind::Semicolon) {
            let cond = self.parse_expr();
            (Some(Box::new(first)), cond)
        } else {
            match first {
                Stmt::Expr(e) => (None, e),
                other => {
                    self.errors += 1;
                    (Some(Box::new(other)), Expr::Bad { pos: self.here() })
                }
            }
        };
        self.allow_composite = saved;
        let then = self.parse_block();
        let else_ = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                Some(Box::new(self.parse_if()))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block())))
            }
        } else {
            None
        };
        self.eat(TokenKind::Semicolon);
        Stmt::If {
            init,
            cond,
            then,
            else_,
        }
    }

    fn parse_for(&mut self) -> Stmt {
        self.bump(); // `for`
        let saved = self.allow_composite;
        self.allow_composite = false;

        if self.at(TokenKind::LBrace) {
            self.allow_composite = saved;
            let body = self.parse_block();
            self.eat(TokenKind::Semicolon);
            return Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
            };
        }

        // `for range x { ... }`
        if self.at(TokenKind::Range) {
            self.bump();
            let expr = self.parse_expr();
            self.allow_composite = saved;
            let body = self.parse_block();
            self.eat(TokenKind::Semicolon);
            return Stmt::Range {
                key: None,
                value: None,
                define: false,
                expr,
                body,
            };
        }

        // `for init; cond; post { ... }` starting with a bare semicolon.
        if self.at(TokenKind::Semicolon) {
            let stmt = self.parse_for_clauses(None);
            self.allow_composite = saved;
            return stmt;
        }

        let mut lhs = vec![self.parse_expr()];
        while self.eat(TokenKind::Comma) {
            lhs.push(self.parse_expr());
        }

        match self.kind() {
            TokenKind::Define | TokenKind::Assign => {
                let define = self.at(TokenKind::Define);
                self.bump();
                if self.eat(TokenKind::Range) {
                    let expr = self.parse_expr();
                    self.allow_composite = saved;
                    let body = self.parse_block();
                    self.eat(TokenKind::Semicolon);
                    let mut iter = lhs.into_iter();
                    return Stmt::Range {
                        key: iter.next(),
                        value: iter.next(),
                        define,
                        expr,
                        body,
                    };
                }
                let mut rhs = Vec::new();
                loop {
                    rhs.push(self.parse_expr());
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let init = Stmt::Assign { lhs, rhs, define };
                let stmt = self.parse_for_clauses(Some(Box::new(init)));
                self.allow_composite = saved;
                stmt
            }
            TokenKind::LBrace => {
                // `for cond { ... }`
                let cond = lhs.remove(0);
                self.allow_composite = saved;
                let body = self.parse_block();
                self.eat(TokenKind::Semicolon);
                Stmt::For {
                    init: None,
                    cond: Some(cond),
                    post: None,
                    body,
                }
            }
            _ => {
                let init = Stmt::Expr(lhs.remove(0));
                let stmt = self.parse_for_clauses(Some(Box::new(init)));
                self.allow_composite = saved;
                stmt
            }
        }
    }

    /// Parse `; cond ; post { body }` with `init` already consumed.
    fn parse_for_clauses(&mut self, init: Option<Box<Stmt>>) -> Stmt {
        self.eat(TokenKind::Semicolon);
        let cond = if !self.at(TokenKind::Semicolon) && !self.at(TokenKind::LBrace) {
            Some(self.parse_expr())
        } else {
            None
        };
        self.eat(TokenKind::Semicolon);
        let post = if !self.at(TokenKind::LBrace) && !self.at(TokenKind::Eof) {
            Some(Box::new(self.parse_simple_stmt()))
        } else {
            None
        };
        let saved = self.allow_composite;
        self.allow_composite = true;
        let body = self.parse_block();
        self.allow_composite = saved;
        self.eat(TokenKind::Semicolon);
        Stmt::For {
            init,
            cond,
            post,
            body,
        }
    }

    fn parse_switch(&mut self) -> Stmt {
        self.bump(); // `switch`
        let saved = self.allow_composite;
        self.allow_composite = false;

        let mut init: Option<Box<Stmt>> = None;
        let mut header: Option<Stmt> = None;
        if !self.at(TokenKind::LBrace) {
            let first = self.parse_simple_stmt();
            if self.eat(TokenKind::Semicolon) {
                init = Some(Box::new(first));
                if !self.at(TokenKind::LBrace) {
                    header = Some(self.parse_simple_stmt());
                }
            } else {
                header = Some(first);
            }
        }
        self.allow_composite = saved;

        // A `.(type)` assertion anywhere in the header makes this a type
        // switch.
        let type_switch = match &header {
            Some(Stmt::Expr(Expr::TypeAssert { ty: None, .. })) => true,
            Some(Stmt::Assign { rhs, .. }) => {
                matches!(rhs.first(), Some(Expr::TypeAssert { ty: None, .. }))
            }
            _ => false,
        };

        let cases = self.parse_case_clauses();
        self.eat(TokenKind::Semicolon);

        if type_switch {
            let (binding, subject) = match header {
                Some(Stmt::Assign { lhs, mut rhs, .. }) => {
                    let binding = match lhs.first() {
                        Some(Expr::Ident(id)) => Some(id.name.clone()),
                        _ => None,
                    };
                    let subject = match rhs.remove(0) {
                        Expr::TypeAssert { expr, .. } => *expr,
                        other => other,
                    };
                    (binding, subject)
                }
                Some(Stmt::Expr(Expr::TypeAssert { expr, .. })) => (None, *expr),
                _ => (None, Expr::Bad { pos: self.here() }),
            };
            Stmt::TypeSwitch {
                init,
                binding,
                subject,
                cases,
            }
        } else {
            let tag = match header {
                Some(Stmt::Expr(e)) => Some(e),
                None => None,
                Some(other) => {
                    init = Some(Box::new(other));
                    None
                }
            };
            Stmt::Switch { init, tag, cases }
        }
    }

    fn parse_case_clauses(&mut self) -> Vec<CaseClause> {
        let mut cases = Vec::new();
        self.expect(TokenKind::LBrace);
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            let mut exprs = Vec::new();
            if self.eat(TokenKind::Case) {
                loop {
                    exprs.push(self.parse_expr());
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            } else if !self.eat(TokenKind::Default) {
                self.errors += 1;
                self.sync_stmt();
                continue;
            }
            self.expect(TokenKind::Colon);
            let mut body = Vec::new();
            while !matches!(
                self.kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                let stmt_before = self.pos;
                body.push(self.parse_stmt());
                if self.pos == stmt_before {
                    self.bump();
                }
            }
            cases.push(CaseClause { exprs, body });
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        cases
    }

    fn parse_select(&mut self) -> Stmt {
        self.bump(); // `select`
        let mut cases = Vec::new();
        self.expect(TokenKind::LBrace);
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            let mut body = Vec::new();
            if self.eat(TokenKind::Case) {
                body.push(self.parse_simple_stmt());
                self.expect(TokenKind::Colon);
            } else if self.eat(TokenKind::Default) {
                self.expect(TokenKind::Colon);
            } else {
                self.errors += 1;
                self.sync_stmt();
                continue;
            }
            while !matches!(
                self.kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                let stmt_before = self.pos;
                body.push(self.parse_stmt());
                if self.pos == stmt_before {
                    self.bump();
                }
            }
            cases.push(CaseClause {
                exprs: Vec::new(),
                body,
            });
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        self.eat(TokenKind::Semicolon);
        Stmt::Select { cases }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let prec = self.kind().precedence();
            if prec < min_prec || prec == 0 {
                return lhs;
            }
            let op = self.bump().kind;
            let rhs = self.parse_binary(prec + 1);
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Expr {
        let pos = self.here();
        match self.kind() {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Not
            | TokenKind::Caret
            | TokenKind::Amp
            | TokenKind::Arrow => {
                let op = self.bump().kind;
                Expr::Unary {
                    op,
                    expr: Box::new(self.parse_unary()),
                    pos,
                }
            }
            TokenKind::Star => {
                self.bump();
                Expr::Star {
                    expr: Box::new(self.parse_unary()),
                    pos,
                }
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let mut expr = self.parse_operand();
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.bump();
                    if self.at(TokenKind::LParen) {
                        let pos = self.here();
                        self.bump();
                        let ty = if self.eat(TokenKind::Type) {
                            None
                        } else {
                            Some(Box::new(self.parse_type()))
                        };
                        self.expect(TokenKind::RParen);
                        expr = Expr::TypeAssert {
                            expr: Box::new(expr),
                            ty,
                            pos,
                        };
                    } else if self.at(TokenKind::Ident) {
                        let tok = self.bump();
                        let sel = Ident::new(tok.text, Pos::new(self.file_id, tok.line));
                        expr = Expr::Selector {
                            expr: Box::new(expr),
                            sel,
                        };
                    } else {
                        self.errors += 1;
                        return expr;
                    }
                }
                TokenKind::LParen => {
                    let pos = self.here();
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                        let saved = self.allow_composite;
                        self.allow_composite = true;
                        args.push(self.parse_expr());
                        self.allow_composite = saved;
                        self.eat(TokenKind::Ellipsis);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen);
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        pos,
                    };
                }
                TokenKind::LBracket => {
                    let pos = self.here();
                    self.bump();
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let mut parts: Vec<Option<Expr>> = Vec::new();
                    let mut indices: Vec<Expr> = Vec::new();
                    let mut is_slice = false;
                    if self.at(TokenKind::Colon) {
                        is_slice = true;
                        parts.push(None);
                    } else if !self.at(TokenKind::RBracket) {
                        indices.push(self.parse_expr());
                    }
                    loop {
                        if self.eat(TokenKind::Colon) {
                            if !is_slice {
                                is_slice = true;
                                parts.push(indices.pop());
                            }
                            if self.at(TokenKind::RBracket) || self.at(TokenKind::Colon) {
                                parts.push(None);
                            } else {
                                parts.push(Some(self.parse_expr()));
                            }
                            continue;
                        }
                        if self.eat(TokenKind::Comma) {
                            if !self.at(TokenKind::RBracket) {
                                indices.push(self.parse_expr());
                            }
                            continue;
                        }
                        break;
                    }
                    self.allow_composite = saved;
                    self.expect(TokenKind::RBracket);
                    expr = if is_slice {
                        Expr::SliceExpr {
                            expr: Box::new(expr),
                            parts,
                            pos,
                        }
                    } else {
                        Expr::Index {
                            expr: Box::new(expr),
                            indices,
                            pos,
                        }
                    };
                }
                TokenKind::LBrace => {
                    if !self.composite_allowed(&expr) {
                        return expr;
                    }
                    let pos = self.here();
                    let ty = expr_to_type(&expr);
                    let elems = self.parse_composite_body();
                    expr = Expr::CompositeLit {
                        ty: ty.map(Box::new),
                        elems,
                        pos,
                    };
                }
                _ => return expr,
            }
        }
    }

    /// Whether `expr {` should be read as a composite literal here.
    fn composite_allowed(&self, expr: &Expr) -> bool {
        match expr {
            // `[]T{...}`, `map[K]V{...}` and friends are unambiguous.
            Expr::TypeRef(_) => true,
            Expr::Ident(_) | Expr::Selector { .. } | Expr::Index { .. } => self.allow_composite,
            _ => false,
        }
    }

    fn parse_operand(&mut self) -> Expr {
        let pos = self.here();
        match self.kind() {
            TokenKind::Ident => {
                let tok = self.bump();
                Expr::Ident(Ident::new(tok.text, Pos::new(self.file_id, tok.line)))
            }
            TokenKind::Int => Expr::BasicLit {
                kind: LitKind::Int,
                text: self.bump().text,
                pos,
            },
            TokenKind::Float => Expr::BasicLit {
                kind: LitKind::Float,
                text: self.bump().text,
                pos,
            },
            TokenKind::Str => Expr::BasicLit {
                kind: LitKind::Str,
                text: self.bump().text,
                pos,
            },
            TokenKind::Rune => Expr::BasicLit {
                kind: LitKind::Rune,
                text: self.bump().text,
                pos,
            },
            TokenKind::LParen => {
                self.bump();
                let saved = self.allow_composite;
                self.allow_composite = true;
                let inner = self.parse_expr();
                self.allow_composite = saved;
                self.expect(TokenKind::RParen);
                Expr::Paren {
                    expr: Box::new(inner),
                    pos,
                }
            }
            TokenKind::Func => {
                self.bump();
                let sig = self.parse_signature();
                if self.at(TokenKind::LBrace) {
                    let saved = self.allow_composite;
                    self.allow_composite = true;
                    let body = self.parse_block();
                    self.allow_composite = saved;
                    Expr::FuncLit {
                        sig: Box::new(sig),
                        body,
                        pos,
                    }
                } else {
                    Expr::TypeRef(TypeExpr::Func {
                        sig: Box::new(sig),
                        pos,
                    })
                }
            }
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface
            | TokenKind::Arrow => Expr::TypeRef(self.parse_type()),
            TokenKind::LBrace => {
                // Untyped literal inside an enclosing composite literal.
                let elems = self.parse_composite_body();
                Expr::CompositeLit {
                    ty: None,
                    elems,
                    pos,
                }
            }
            _ => {
                self.errors += 1;
                self.bump();
                Expr::Bad { pos }
            }
        }
    }

    fn parse_composite_body(&mut self) -> Vec<Expr> {
        self.expect(TokenKind::LBrace);
        let saved = self.allow_composite;
        self.allow_composite = true;
        let mut elems = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Semicolon) || self.at(TokenKind::Comma) {
                self.bump();
                continue;
            }
            let before = self.pos;
            let e = self.parse_expr();
            if self.eat(TokenKind::Colon) {
                let value = self.parse_expr();
                elems.push(Expr::KeyValue {
                    key: Box::new(e),
                    value: Box::new(value),
                });
            } else {
                elems.push(e);
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.allow_composite = saved;
        self.expect(TokenKind::RBrace);
        elems
    }
}

/// Reinterpret an expression as the type of a composite literal.
fn expr_to_type(expr: &Expr) -> Option<TypeExpr> {
    match expr {
        Expr::Ident(id) => Some(TypeExpr::Name {
            qualifier: None,
            name: id.name.clone(),
            pos: id.pos,
        }),
        Expr::Selector { expr, sel } => match expr.as_ref() {
            Expr::Ident(pkg) => Some(TypeExpr::Name {
                qualifier: Some(pkg.name.clone()),
                name: sel.name.clone(),
                pos: pkg.pos,
            }),
            _ => None,
        },
        Expr::Index { expr, pos, .. } => {
            let base = expr_to_type(expr)?;
            Some(TypeExpr::Generic {
                base: Box::new(base),
                args: Vec::new(),
                pos: *pos,
            })
        }
        Expr::TypeRef(ty) => Some(ty.clone()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
