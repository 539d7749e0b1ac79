//! Source structure extraction.
//!
//! Finds imports, functions, and classes in a source file with line-level
//! pattern matching. This is deliberately shallow: no grammar, no type
//! information, just enough to describe a file to an LLM and to show
//! counts in the UI.
//!
//! | Language | Imports | Functions | Classes |
//! |----------|---------|-----------|---------|
//! | Python | `import`, `from … import` | `def`, `async def` | `class` |
//! | JavaScript / TypeScript | `import … from`, `require()` | declarations, arrow consts, methods | `class` |
//! | Go | single and grouped `import` | `func`, receiver methods | `type … struct\|interface` |
//! | Rust | `use` | `fn`, methods in `impl`/`trait` | `struct`, `enum`, `trait` |
//! | Java | `import` | methods | `class`, `interface`, `enum`, `record` |
//!
//! Other languages only get line and size counts.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{ClassInfo, FileStructure, FunctionInfo, RepoStats, RepoStructure};

/// Extract the structure of a file given its extension (without the dot).
pub fn extract_structure(extension: &str, text: &str) -> FileStructure {
    let mut structure = FileStructure {
        language: language_for(extension).to_string(),
        lines: text.lines().count(),
        size: text.chars().count(),
        ..FileStructure::default()
    };

    match extension {
        "py" => python::extract(text, &mut structure),
        "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => javascript::extract(text, &mut structure),
        "go" => golang::extract(text, &mut structure),
        "rs" => rust::extract(text, &mut structure),
        "java" => java::extract(text, &mut structure),
        _ => {}
    }

    structure
}

pub fn language_for(extension: &str) -> &'static str {
    match extension {
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "html" => "html",
        "css" => "css",
        _ => "text",
    }
}

/// Aggregate counts over a repository's file structures.
pub fn repo_stats(structure: &RepoStructure) -> RepoStats {
    let mut stats = RepoStats {
        total_files: structure.len(),
        ..RepoStats::default()
    };
    for (path, file) in structure {
        let extension = path
            .rsplit_once('.')
            .filter(|(_, ext)| !ext.contains('/'))
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "py" => stats.python_files += 1,
            "js" | "jsx" | "ts" | "tsx" => stats.js_files += 1,
            _ => {}
        }
        stats.total_functions += file.functions.len();
        stats.total_classes += file.classes.len();
    }
    stats
}

// ============ Shared helpers ============

/// Split a parameter list on top-level commas.
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Net `{`/`}` count for a line of a C-family language, ignoring string
/// literals and `//` comments. With `lifetimes`, a `'` only opens a char
/// literal when it looks like one (`'x'`, `'\n'`).
fn brace_delta(line: &str, lifetimes: bool) -> i32 {
    let chars: Vec<char> = line.chars().collect();
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' if lifetimes => {
                let is_char = chars.get(i + 1) == Some(&'\\') || chars.get(i + 2) == Some(&'\'');
                if is_char {
                    quote = Some(c);
                }
            }
            '"' | '\'' | '`' => quote = Some(c),
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
        i += 1;
    }
    delta
}

/// Collects `/** … */`, `///`, and `//` comment blocks so the next
/// definition can claim them as its docstring.
#[derive(Default)]
struct DocCollector {
    in_block: bool,
    lines: Vec<String>,
}

impl DocCollector {
    /// Returns `true` if the line was a comment and has been consumed.
    fn feed(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if self.in_block {
            let (content, done) = match trimmed.find("*/") {
                Some(pos) => (&trimmed[..pos], true),
                None => (trimmed, false),
            };
            self.push(content.trim_start_matches('*'));
            if done {
                self.in_block = false;
            }
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix("/**") {
            self.lines.clear();
            match rest.find("*/") {
                Some(pos) => self.push(&rest[..pos]),
                None => {
                    self.push(rest);
                    self.in_block = true;
                }
            }
            return true;
        }
        if trimmed.starts_with("/*") {
            // Plain block comments are not documentation.
            self.lines.clear();
            self.in_block = !trimmed.contains("*/");
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix("//") {
            let rest = rest.trim_start_matches('/').trim_start_matches('!');
            self.push(rest);
            return true;
        }
        false
    }

    fn push(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    fn take(&mut self) -> String {
        let doc = self.lines.join("\n");
        self.lines.clear();
        doc
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Tracks which class-like block encloses the current line of a
/// brace-delimited file.
#[derive(Default)]
struct BraceScope {
    lifetimes: bool,
    depth: i32,
    /// (class index, depth of the class body)
    owners: Vec<(usize, i32)>,
}

impl BraceScope {
    /// Class whose body is exactly at the current depth.
    fn direct_owner(&self) -> Option<usize> {
        self.owners
            .last()
            .filter(|(_, body)| *body == self.depth)
            .map(|(idx, _)| *idx)
    }

    /// Register a class whose body starts on this line.
    fn open(&mut self, idx: usize) {
        self.owners.push((idx, self.depth + 1));
    }

    fn advance(&mut self, line: &str) {
        self.depth += brace_delta(line, self.lifetimes);
        while let Some((_, body)) = self.owners.last() {
            if self.depth < *body {
                self.owners.pop();
            } else {
                break;
            }
        }
    }
}

fn push_method(structure: &mut FileStructure, owner: Option<usize>, func: FunctionInfo) {
    if let Some(idx) = owner {
        structure.classes[idx].methods.push(func.clone());
    }
    structure.functions.push(func);
}

// ============ Python ============

mod python {
    use super::*;

    static DEF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());
    static CLASS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)").unwrap());
    static IMPORT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)^import\s+(.+)$").unwrap());
    static FROM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)^from\s+(\S+)\s+import\s+(.+)$").unwrap());

    /// A statement possibly spanning several physical lines.
    struct LogicalLine {
        line: usize,
        indent: usize,
        text: String,
    }

    enum Block {
        Class(usize),
        Def,
    }

    pub(super) fn extract(text: &str, structure: &mut FileStructure) {
        let logical = logical_lines(text);
        let mut stack: Vec<(usize, Block)> = Vec::new();

        for (i, ll) in logical.iter().enumerate() {
            while stack.last().is_some_and(|(indent, _)| *indent >= ll.indent) {
                stack.pop();
            }
            let stmt = ll.text.trim();

            if let Some(caps) = DEF_RE.captures(stmt) {
                let func = FunctionInfo {
                    name: caps[1].to_string(),
                    line: ll.line,
                    args: parse_args(stmt),
                    docstring: docstring_after(&logical, i),
                };
                let owner = match stack.last() {
                    Some((_, Block::Class(idx))) => Some(*idx),
                    _ => None,
                };
                push_method(structure, owner, func);
                stack.push((ll.indent, Block::Def));
            } else if let Some(caps) = CLASS_RE.captures(stmt) {
                structure.classes.push(ClassInfo {
                    name: caps[1].to_string(),
                    line: ll.line,
                    methods: Vec::new(),
                    docstring: docstring_after(&logical, i),
                });
                stack.push((ll.indent, Block::Class(structure.classes.len() - 1)));
            } else if let Some(caps) = FROM_RE.captures(stmt) {
                let module = &caps[1];
                for name in import_names(&caps[2]) {
                    structure.imports.push(format!("{}.{}", module, name));
                }
            } else if let Some(caps) = IMPORT_RE.captures(stmt) {
                structure.imports.extend(import_names(&caps[1]));
            }
        }
    }

    fn import_names(list: &str) -> Vec<String> {
        list.replace(['(', ')', '\\'], " ")
            .split(',')
            .filter_map(|part| part.split_whitespace().next())
            .map(|s| s.to_string())
            .collect()
    }

    /// Positional parameter names, stopping at `*args` / keyword-only.
    fn parse_args(stmt: &str) -> Vec<String> {
        let Some(open) = stmt.find('(') else {
            return Vec::new();
        };
        let mut depth = 0i32;
        let mut close = stmt.len();
        for (i, c) in stmt[open..].char_indices() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = open + i;
                        break;
                    }
                }
                _ => {}
            }
        }
        let inner = &stmt[open + 1..close.max(open + 1)];

        let mut args = Vec::new();
        for param in split_params(inner) {
            if param == "/" {
                continue;
            }
            if param.starts_with('*') {
                break;
            }
            let name = param
                .split(|c| c == ':' || c == '=')
                .next()
                .unwrap_or("")
                .trim();
            if !name.is_empty() {
                args.push(name.to_string());
            }
        }
        args
    }

    /// Docstring of the def/class at `logical[idx]`: the first statement of
    /// its body when that statement is a bare string literal.
    fn docstring_after(logical: &[LogicalLine], idx: usize) -> String {
        let header = &logical[idx];
        let stmt = header.text.trim_end();
        // Body on the same line, e.g. `def f(): """doc"""`.
        if let Some(pos) = header_colon(stmt) {
            let rest = stmt[pos + 1..].trim();
            if !rest.is_empty() {
                return string_literal(rest).unwrap_or_default();
            }
        }
        match logical.get(idx + 1) {
            Some(next) if next.indent > header.indent => {
                string_literal(next.text.trim()).unwrap_or_default()
            }
            _ => String::new(),
        }
    }

    /// Byte offset of the `:` that ends a def/class header.
    fn header_colon(stmt: &str) -> Option<usize> {
        let mut depth = 0i32;
        for (i, c) in stmt.char_indices() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ':' if depth == 0 => {
                    // Skip return annotations like `-> Dict[str, int]:`
                    // by taking the last top-level colon before any string.
                    let rest = &stmt[i + 1..];
                    if rest.trim().is_empty() || rest.trim_start().starts_with(['"', '\'']) {
                        return Some(i);
                    }
                    if !rest.contains(':') {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Contents of a Python string literal statement, cleaned like
    /// `inspect.cleandoc`.
    fn string_literal(stmt: &str) -> Option<String> {
        let body = stmt.trim_start_matches(|c: char| "rRuUbB".contains(c));
        let quote = ["\"\"\"", "'''", "\"", "'"]
            .into_iter()
            .find(|q| body.starts_with(q))?;
        let inner = &body[quote.len()..];
        let end = inner.rfind(quote)?;
        Some(clean_doc(&inner[..end]))
    }

    fn clean_doc(raw: &str) -> String {
        let lines: Vec<&str> = raw.lines().collect();
        let indent = lines
            .iter()
            .skip(1)
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        let cleaned: Vec<String> = lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                if i == 0 {
                    l.trim().to_string()
                } else {
                    l.get(indent..).unwrap_or(l.trim_start()).trim_end().to_string()
                }
            })
            .collect();
        cleaned.join("\n").trim().to_string()
    }

    /// Group physical lines into statements: bracket continuations,
    /// backslash continuations, and multi-line strings are joined; blank
    /// and comment-only lines are dropped.
    fn logical_lines(text: &str) -> Vec<LogicalLine> {
        let mut out = Vec::new();
        let mut current: Option<LogicalLine> = None;
        let mut depth = 0i32;
        let mut triple: Option<&'static str> = None;

        for (n, raw) in text.lines().enumerate() {
            let trimmed = raw.trim_start();
            if current.is_none() && (trimmed.is_empty() || trimmed.starts_with('#')) {
                continue;
            }
            let cur = current.get_or_insert_with(|| LogicalLine {
                line: n + 1,
                indent: raw.len() - trimmed.len(),
                text: String::new(),
            });
            if !cur.text.is_empty() {
                cur.text.push('\n');
            }

            let (code, open_triple) = scan_line(raw, &mut depth, triple);
            triple = open_triple;
            cur.text.push_str(if triple.is_some() { raw } else { code });

            let continued = triple.is_some() || depth > 0 || code.trim_end().ends_with('\\');
            if !continued {
                depth = 0;
                out.extend(current.take());
            }
        }
        out.extend(current);
        out
    }

    /// Scan one physical line, updating bracket depth and triple-quote
    /// state. Returns the line with any trailing comment removed and the
    /// triple quote still open at end of line, if any.
    fn scan_line<'a>(
        line: &'a str,
        depth: &mut i32,
        mut triple: Option<&'static str>,
    ) -> (&'a str, Option<&'static str>) {
        let bytes = line.as_bytes();
        let mut i = 0;
        let mut quote: Option<u8> = None;

        while i < bytes.len() {
            if let Some(t) = triple {
                if bytes[i..].starts_with(t.as_bytes()) {
                    triple = None;
                    i += 3;
                } else {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                continue;
            }
            if let Some(q) = quote {
                if bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes[i] == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match bytes[i] {
                b'#' => return (&line[..i], None),
                b'"' | b'\'' => {
                    let t = if bytes[i] == b'"' { "\"\"\"" } else { "'''" };
                    if bytes[i..].starts_with(t.as_bytes()) {
                        triple = Some(t);
                        i += 3;
                        continue;
                    }
                    quote = Some(bytes[i]);
                }
                b'(' | b'[' | b'{' => *depth += 1,
                b')' | b']' | b'}' => *depth -= 1,
                _ => {}
            }
            i += 1;
        }
        (line, triple)
    }

}

// ============ JavaScript / TypeScript ============

mod javascript {
    use super::*;

    static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"^\s*import\s+(?:type\s+)?(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap()
    });
    static REQUIRE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
    static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^(]*>)?\s*\(([^)]*)",
        )
        .unwrap()
    });
    static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\(([^)]*)\)|([A-Za-z_$][\w$]*))\s*(?::[^=]+)?=>",
        )
        .unwrap()
    });
    static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
        )
        .unwrap()
    });
    static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*\*?([A-Za-z_$#][\w$]*)\s*(?:<[^(]*>)?\s*\(([^)]*)\)[^;]*\{",
        )
        .unwrap()
    });

    const NOT_METHODS: [&str; 8] = [
        "if", "for", "while", "switch", "catch", "return", "function", "with",
    ];

    pub(super) fn extract(text: &str, structure: &mut FileStructure) {
        let mut docs = DocCollector::default();
        let mut scope = BraceScope::default();

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            if docs.feed(line) {
                continue;
            }
            if line.trim().is_empty() {
                scope.advance(line);
                continue;
            }

            if let Some(caps) = IMPORT_RE.captures(line) {
                structure.imports.push(caps[1].to_string());
            } else if let Some(caps) = REQUIRE_RE.captures(line) {
                structure.imports.push(caps[1].to_string());
            }

            if let Some(caps) = CLASS_RE.captures(line) {
                structure.classes.push(ClassInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    methods: Vec::new(),
                    docstring: docs.take(),
                });
                scope.open(structure.classes.len() - 1);
            } else if let Some(caps) = FUNCTION_RE.captures(line) {
                let func = FunctionInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    args: param_names(&caps[2]),
                    docstring: docs.take(),
                };
                push_method(structure, None, func);
            } else if let Some(caps) = ARROW_RE.captures(line) {
                let args = match (caps.get(2), caps.get(3)) {
                    (Some(list), _) => param_names(list.as_str()),
                    (None, Some(single)) => vec![single.as_str().to_string()],
                    _ => Vec::new(),
                };
                let func = FunctionInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    args,
                    docstring: docs.take(),
                };
                push_method(structure, None, func);
            } else if let Some(owner) = scope.direct_owner() {
                if let Some(caps) = METHOD_RE.captures(line) {
                    let name = &caps[1];
                    if !NOT_METHODS.contains(&name) {
                        let func = FunctionInfo {
                            name: name.to_string(),
                            line: line_no,
                            args: param_names(&caps[2]),
                            docstring: docs.take(),
                        };
                        push_method(structure, Some(owner), func);
                    }
                }
            }

            docs.clear();
            scope.advance(line);
        }
    }

    fn param_names(params: &str) -> Vec<String> {
        split_params(params)
            .into_iter()
            .map(|p| {
                let p = p.trim_start_matches("...");
                if p.starts_with('{') || p.starts_with('[') {
                    return p.to_string();
                }
                p.split(|c| c == ':' || c == '=' || c == '?')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string()
            })
            .filter(|p| !p.is_empty())
            .collect()
    }
}

// ============ Go ============

mod golang {
    use super::*;

    static IMPORT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).unwrap());
    static IMPORT_SPEC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#).unwrap());
    static FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^func\s+(?:\(([^)]*)\)\s*)?([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*\(([^)]*)")
            .unwrap()
    });
    static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^type\s+([A-Za-z_]\w*)(?:\[[^\]]*\])?\s+(?:struct|interface)\b").unwrap()
    });

    pub(super) fn extract(text: &str, structure: &mut FileStructure) {
        let mut docs = DocCollector::default();
        let mut in_import_block = false;
        // Methods whose receiver type is declared later in the file.
        let mut receivers: Vec<(String, FunctionInfo)> = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            let trimmed = line.trim();

            if in_import_block {
                if trimmed.starts_with(')') {
                    in_import_block = false;
                } else if let Some(caps) = IMPORT_SPEC_RE.captures(line) {
                    structure.imports.push(caps[1].to_string());
                }
                continue;
            }
            if docs.feed(line) {
                continue;
            }
            if trimmed.is_empty() {
                docs.clear();
                continue;
            }

            if trimmed.starts_with("import (") || trimmed == "import(" {
                in_import_block = true;
            } else if let Some(caps) = IMPORT_RE.captures(line) {
                structure.imports.push(caps[1].to_string());
            } else if let Some(caps) = TYPE_RE.captures(line) {
                structure.classes.push(ClassInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    methods: Vec::new(),
                    docstring: docs.take(),
                });
            } else if let Some(caps) = FUNC_RE.captures(line) {
                let func = FunctionInfo {
                    name: caps[2].to_string(),
                    line: line_no,
                    args: param_names(&caps[3]),
                    docstring: docs.take(),
                };
                if let Some(recv) = caps.get(1) {
                    receivers.push((receiver_type(recv.as_str()), func.clone()));
                }
                structure.functions.push(func);
            }
            docs.clear();
        }

        for (type_name, func) in receivers {
            if let Some(class) = structure.classes.iter_mut().find(|c| c.name == type_name) {
                class.methods.push(func);
            }
        }
    }

    /// `s *Server` → `Server`; `Stack[T]` → `Stack`.
    fn receiver_type(recv: &str) -> String {
        let ty = recv.split_whitespace().last().unwrap_or("");
        ty.trim_start_matches('*')
            .split('[')
            .next()
            .unwrap_or("")
            .to_string()
    }

    /// `a, b int, c string` → `[a, b, c]`.
    fn param_names(params: &str) -> Vec<String> {
        split_params(params)
            .into_iter()
            .filter_map(|p| p.split_whitespace().next())
            .map(|s| s.to_string())
            .collect()
    }
}

// ============ Rust ============

mod rust {
    use super::*;

    static USE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);?").unwrap()
    });
    static FN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:default\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+([A-Za-z_]\w*)\s*(?:<[^(]*>)?\s*\(([^)]*)"#,
        )
        .unwrap()
    });
    static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(struct|enum|trait|union)\s+([A-Za-z_]\w*)")
            .unwrap()
    });
    static IMPL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:unsafe\s+)?impl\b(?:\s*<[^{]*?>)?\s+(?:[\w:<>, &']+\s+for\s+)?&?([A-Za-z_]\w*)")
            .unwrap()
    });

    pub(super) fn extract(text: &str, structure: &mut FileStructure) {
        let mut docs = DocCollector::default();
        let mut scope = BraceScope {
            lifetimes: true,
            ..BraceScope::default()
        };

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            if docs.feed(line) {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("#[") {
                scope.advance(line);
                continue;
            }

            if let Some(caps) = USE_RE.captures(line) {
                structure.imports.push(caps[1].trim().to_string());
            } else if let Some(caps) = TYPE_RE.captures(line) {
                let is_trait = &caps[1] == "trait";
                let name = caps[2].to_string();
                let idx = class_index(structure, &name, line_no, docs.take());
                if is_trait {
                    scope.open(idx);
                }
            } else if let Some(caps) = IMPL_RE.captures(line) {
                let name = caps[1].to_string();
                let idx = class_index(structure, &name, line_no, String::new());
                scope.open(idx);
            } else if let Some(caps) = FN_RE.captures(line) {
                let func = FunctionInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    args: param_names(&caps[2]),
                    docstring: docs.take(),
                };
                push_method(structure, scope.direct_owner(), func);
            }

            docs.clear();
            scope.advance(line);
        }
    }

    /// Index of the named type, registering it if an `impl` precedes (or
    /// lives apart from) its declaration.
    fn class_index(structure: &mut FileStructure, name: &str, line: usize, doc: String) -> usize {
        if let Some(idx) = structure.classes.iter().position(|c| c.name == name) {
            return idx;
        }
        structure.classes.push(ClassInfo {
            name: name.to_string(),
            line,
            methods: Vec::new(),
            docstring: doc,
        });
        structure.classes.len() - 1
    }

    fn param_names(params: &str) -> Vec<String> {
        split_params(params)
            .into_iter()
            .map(|p| {
                if p.ends_with("self") {
                    return "self".to_string();
                }
                p.split(':')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .trim_start_matches("mut ")
                    .to_string()
            })
            .filter(|p| !p.is_empty())
            .collect()
    }
}

// ============ Java ============

mod java {
    use super::*;

    static IMPORT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*import\s+(?:static\s+)?([\w.*]+)\s*;").unwrap());
    static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:@\w+\s+)*(?:(?:public|private|protected|abstract|final|static|sealed|non-sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_]\w*)",
        )
        .unwrap()
    });
    static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^\s*(?:@\w+\s+)*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]+>\s+)?(?:[\w.<>\[\]?, ]+\s+)?([A-Za-z_]\w*)\s*\(([^)]*)\)",
        )
        .unwrap()
    });

    const NOT_METHODS: [&str; 9] = [
        "if", "for", "while", "switch", "catch", "return", "new", "else", "synchronized",
    ];

    pub(super) fn extract(text: &str, structure: &mut FileStructure) {
        let mut docs = DocCollector::default();
        let mut scope = BraceScope::default();

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            if docs.feed(line) {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || (trimmed.starts_with('@') && !trimmed.contains('(')) {
                scope.advance(line);
                continue;
            }

            if let Some(caps) = IMPORT_RE.captures(line) {
                structure.imports.push(caps[1].to_string());
            } else if let Some(caps) = CLASS_RE.captures(line) {
                structure.classes.push(ClassInfo {
                    name: caps[1].to_string(),
                    line: line_no,
                    methods: Vec::new(),
                    docstring: docs.take(),
                });
                scope.open(structure.classes.len() - 1);
            } else if let Some(owner) = scope.direct_owner() {
                if let Some(caps) = METHOD_RE.captures(line) {
                    let name = &caps[1];
                    if !NOT_METHODS.contains(&name) && !trimmed.contains(" = ") {
                        let func = FunctionInfo {
                            name: name.to_string(),
                            line: line_no,
                            args: param_names(&caps[2]),
                            docstring: docs.take(),
                        };
                        push_method(structure, Some(owner), func);
                    }
                }
            }

            docs.clear();
            scope.advance(line);
        }
    }

    /// `final String name, int count` → `[name, count]`.
    fn param_names(params: &str) -> Vec<String> {
        split_params(params)
            .into_iter()
            .filter_map(|p| p.split_whitespace().last())
            .map(|s| s.trim_start_matches("...").to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY_SAMPLE: &str = r#"import os, sys
from typing import (
    Dict,
    List as L,
)
import numpy as np


def top_level(a, b: int = 3, *rest):
    """Add things.

    Longer description.
    """
    def inner(x):
        return x
    return a + b


class Greeter(Base):
    '''Says hello.'''

    greeting = "hi # not a comment"

    def __init__(self, name):
        self.name = name

    async def greet(self, loud=False):
        # comment
        return f"{self.greeting} {self.name}"


async def fetch(
    url,
    timeout=10,
):
    pass
"#;

    #[test]
    fn test_python_imports() {
        let s = extract_structure("py", PY_SAMPLE);
        assert_eq!(
            s.imports,
            vec!["os", "sys", "typing.Dict", "typing.List", "numpy"]
        );
    }

    #[test]
    fn test_python_functions_include_methods_and_nested() {
        let s = extract_structure("py", PY_SAMPLE);
        let names: Vec<&str> = s.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["top_level", "inner", "__init__", "greet", "fetch"]
        );

        let top = &s.functions[0];
        assert_eq!(top.line, 9);
        assert_eq!(top.args, vec!["a", "b"]);
        assert_eq!(top.docstring, "Add things.\n\nLonger description.");

        let fetch = s.functions.iter().find(|f| f.name == "fetch").unwrap();
        assert_eq!(fetch.line, 32);
        assert_eq!(fetch.args, vec!["url", "timeout"]);
    }

    #[test]
    fn test_python_classes() {
        let s = extract_structure("py", PY_SAMPLE);
        assert_eq!(s.classes.len(), 1);
        let class = &s.classes[0];
        assert_eq!(class.name, "Greeter");
        assert_eq!(class.line, 19);
        assert_eq!(class.docstring, "Says hello.");
        let methods: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["__init__", "greet"]);
        assert_eq!(class.methods[1].args, vec!["self", "loud"]);
    }

    #[test]
    fn test_python_counts() {
        let s = extract_structure("py", PY_SAMPLE);
        assert_eq!(s.language, "python");
        assert_eq!(s.lines, PY_SAMPLE.lines().count());
        assert_eq!(s.size, PY_SAMPLE.chars().count());
    }

    #[test]
    fn test_javascript() {
        let src = r#"import React, { useState } from 'react';
const fs = require("fs");

/**
 * Renders the app.
 */
export default function App(props) {
  return null;
}

export const add = (a, b = 1) => a + b;
const double = x => x * 2;

class Store extends Base {
  constructor(initial) {
    super();
  }

  async load(url, { retries }) {
    if (retries) {
      return fetch(url);
    }
  }
}
"#;
        let s = extract_structure("jsx", src);
        assert_eq!(s.language, "javascript");
        assert_eq!(s.imports, vec!["react", "fs"]);

        let names: Vec<&str> = s.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["App", "add", "double", "constructor", "load"]);
        assert_eq!(s.functions[0].docstring, "Renders the app.");
        assert_eq!(s.functions[0].line, 7);
        assert_eq!(s.functions[1].args, vec!["a", "b"]);
        assert_eq!(s.functions[2].args, vec!["x"]);

        assert_eq!(s.classes.len(), 1);
        assert_eq!(s.classes[0].name, "Store");
        assert_eq!(s.classes[0].methods.len(), 2);
        assert_eq!(s.classes[0].methods[1].args, vec!["url", "{ retries }"]);
    }

    #[test]
    fn test_typescript_imports() {
        let src = "import type { Foo } from './foo';\nimport './styles.css';\n";
        let s = extract_structure("ts", src);
        assert_eq!(s.language, "typescript");
        assert_eq!(s.imports, vec!["./foo", "./styles.css"]);
    }

    #[test]
    fn test_go() {
        let src = r#"package main

import "fmt"
import (
	"net/http"
	log "github.com/sirupsen/logrus"
)

// Server handles requests.
type Server struct {
	addr string
}

// Start runs the server.
func (s *Server) Start(addr string, port int) error {
	return nil
}

func main() {
	fmt.Println("hi")
}
"#;
        let s = extract_structure("go", src);
        assert_eq!(
            s.imports,
            vec!["fmt", "net/http", "github.com/sirupsen/logrus"]
        );
        assert_eq!(s.classes.len(), 1);
        assert_eq!(s.classes[0].docstring, "Server handles requests.");
        assert_eq!(s.classes[0].methods.len(), 1);
        assert_eq!(s.classes[0].methods[0].name, "Start");
        assert_eq!(s.classes[0].methods[0].args, vec!["addr", "port"]);
        assert_eq!(s.classes[0].methods[0].docstring, "Start runs the server.");
        let names: Vec<&str> = s.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Start", "main"]);
    }

    #[test]
    fn test_rust() {
        let src = r#"use std::collections::HashMap;
use crate::models::{Chunk, SourceFile};

/// A cache of things.
pub struct Cache {
    map: HashMap<String, String>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub async fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }
}

fn helper(mut n: usize) -> usize {
    n += 1;
    n
}
"#;
        let s = extract_structure("rs", src);
        assert_eq!(
            s.imports,
            vec!["std::collections::HashMap", "crate::models::{Chunk, SourceFile}"]
        );
        assert_eq!(s.classes.len(), 1);
        let cache = &s.classes[0];
        assert_eq!(cache.name, "Cache");
        assert_eq!(cache.docstring, "A cache of things.");
        let methods: Vec<&str> = cache.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["new", "get"]);
        assert_eq!(cache.methods[0].docstring, "Create an empty cache.");
        assert_eq!(cache.methods[1].args, vec!["self", "key"]);

        let helper = s.functions.iter().find(|f| f.name == "helper").unwrap();
        assert_eq!(helper.args, vec!["n"]);
        assert_eq!(helper.line, 20);
    }

    #[test]
    fn test_java() {
        let src = r#"package com.example;

import java.util.List;
import static org.junit.Assert.assertEquals;

/** Manages users. */
public class UserService {
    private final List<String> users = new ArrayList<>();

    /**
     * Adds a user.
     */
    public void addUser(final String name, int age) {
        if (name != null) {
            users.add(name);
        }
    }

    public static <T> List<T> wrap(T item) {
        return List.of(item);
    }
}
"#;
        let s = extract_structure("java", src);
        assert_eq!(
            s.imports,
            vec!["java.util.List", "org.junit.Assert.assertEquals"]
        );
        assert_eq!(s.classes.len(), 1);
        assert_eq!(s.classes[0].docstring, "Manages users.");
        let methods: Vec<&str> = s.classes[0]
            .methods
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(methods, vec!["addUser", "wrap"]);
        assert_eq!(s.classes[0].methods[0].args, vec!["name", "age"]);
        assert_eq!(s.classes[0].methods[0].docstring, "Adds a user.");
    }

    #[test]
    fn test_unknown_language_counts_only() {
        let s = extract_structure("rb", "def hello\n  puts 'hi'\nend\n");
        assert_eq!(s.language, "ruby");
        assert_eq!(s.lines, 3);
        assert!(s.functions.is_empty());
        assert!(s.classes.is_empty());
    }

    #[test]
    fn test_repo_stats() {
        let mut repo = RepoStructure::new();
        repo.insert("a.py".to_string(), extract_structure("py", PY_SAMPLE));
        repo.insert("b.tsx".to_string(), FileStructure::default());
        repo.insert("c.go".to_string(), FileStructure::default());
        let stats = repo_stats(&repo);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.python_files, 1);
        assert_eq!(stats.js_files, 1);
        assert_eq!(stats.total_functions, 5);
        assert_eq!(stats.total_classes, 1);
    }

    #[test]
    fn test_repo_stats_ignores_extension_case() {
        let mut repo = RepoStructure::new();
        repo.insert("src/App.TSX".to_string(), FileStructure::default());
        repo.insert("tools/Build.PY".to_string(), FileStructure::default());
        repo.insert("v1.2/notes".to_string(), FileStructure::default());
        let stats = repo_stats(&repo);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.js_files, 1);
        assert_eq!(stats.python_files, 1);
    }
}
