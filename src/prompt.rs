//! Prompt construction and LLM-free fallbacks.
//!
//! Every prompt is a single user message. The `basic_*` renderers produce
//! markdown from the same inputs when no LLM is configured or the call
//! fails, so `/analyze` and `/explain` always have something to return.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::llm::Sampling;
use crate::models::{FileStructure, RepoStats, RepoStructure, RetrievedChunk};

pub const SUMMARY_SAMPLING: Sampling = Sampling {
    max_tokens: 1000,
    temperature: 0.3,
};
pub const ANSWER_SAMPLING: Sampling = Sampling {
    max_tokens: 800,
    temperature: 0.2,
};
pub const EXPLAIN_SAMPLING: Sampling = Sampling {
    max_tokens: 600,
    temperature: 0.2,
};

/// Top-level entries shown in the summary prompt.
pub const SUMMARY_LISTING_LIMIT: usize = 30;
const BASIC_LISTING_LIMIT: usize = 20;
const README_PROMPT_CHARS: usize = 10_000;
const README_BASIC_CHARS: usize = 2_000;

const SUMMARY_PHRASES: [&str; 3] = ["repo about", "what is the repo", "project purpose"];

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pretty JSON of the first `n` file structures.
fn structure_excerpt(structure: &RepoStructure, n: usize) -> String {
    let excerpt: BTreeMap<&String, &FileStructure> = structure.iter().take(n).collect();
    serde_json::to_string_pretty(&excerpt).unwrap_or_else(|_| "{}".to_string())
}

fn extension_label(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => ext.to_uppercase(),
        _ => "UNKNOWN".to_string(),
    }
}

/// True for questions the repository summary already answers.
pub fn is_summary_question(question: &str) -> bool {
    let lower = question.trim().to_lowercase();
    SUMMARY_PHRASES.iter().any(|p| lower.contains(p))
}

pub fn summary_prompt(
    readme: &str,
    listing: &[String],
    stats: &RepoStats,
    structure: &RepoStructure,
) -> String {
    let listing = listing
        .iter()
        .take(SUMMARY_LISTING_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert codebase analyst. Provide a comprehensive, developer-friendly summary of this repository.

REPOSITORY ANALYSIS:
- Total files: {total_files}
- Python files: {python_files}
- JavaScript/TypeScript files: {js_files}
- Total functions: {total_functions}
- Total classes: {total_classes}

README CONTENT:
{readme}

TOP-LEVEL CONTENTS:
{listing}

CODE STRUCTURE HIGHLIGHTS:
{structure}

Please provide:
1. **Project Purpose**: What does this project do?
2. **Tech Stack**: What technologies, frameworks, and languages are used?
3. **Architecture**: Key components and how they're organized
4. **Getting Started**: Quick setup instructions for developers
5. **Key Features**: Main functionality and capabilities
6. **File Structure**: Important directories and their purposes

Format your response in markdown with clear sections.
"#,
        total_files = stats.total_files,
        python_files = stats.python_files,
        js_files = stats.js_files,
        total_functions = stats.total_functions,
        total_classes = stats.total_classes,
        readme = take_chars(readme, README_PROMPT_CHARS),
        listing = listing,
        structure = structure_excerpt(structure, 10),
    )
}

/// Markdown overview rendered without an LLM.
pub fn basic_summary(
    readme: &str,
    listing: &[String],
    stats: &RepoStats,
    structure: &RepoStructure,
) -> String {
    let mut out = String::new();
    let listing = listing
        .iter()
        .take(BASIC_LISTING_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let ellipsis = if readme.chars().count() > README_BASIC_CHARS {
        "..."
    } else {
        ""
    };

    let _ = write!(
        out,
        "## Repository Overview (Basic Analysis)\n\n\
         ### Project Statistics\n\
         - **Total Files**: {}\n\
         - **Python Files**: {}\n\
         - **JavaScript/TypeScript Files**: {}\n\
         - **Total Functions**: {}\n\
         - **Total Classes**: {}\n\n\
         ### Top-Level Structure\n```\n{}\n```\n\n\
         ### README Content\n{}{}\n\n\
         ### Key Files Found\n",
        stats.total_files,
        stats.python_files,
        stats.js_files,
        stats.total_functions,
        stats.total_classes,
        listing,
        take_chars(readme, README_BASIC_CHARS),
        ellipsis,
    );

    for path in structure.keys().take(10) {
        let _ = writeln!(out, "- **{}** ({})", path, extension_label(path));
    }

    let verdict = if stats.python_files > stats.js_files {
        "Python"
    } else if stats.js_files > stats.python_files {
        "JavaScript/TypeScript"
    } else {
        "mixed"
    };
    let has_structure = stats.total_functions > 0 || stats.total_classes > 0;

    let _ = write!(
        out,
        "\n### Analysis Notes\n\
         - This appears to be a {} project\n\
         - {}\n\
         - {}\n\n\
         ### Next Steps\n\
         Configure an `[llm]` provider (OpenAI or Ollama) for an AI-generated summary.\n",
        verdict,
        if has_structure {
            "Has significant code structure"
        } else {
            "Basic file structure"
        },
        if readme.is_empty() {
            "No README found"
        } else {
            "Contains documentation"
        },
    );

    out
}

/// Render retrieved chunks as the context block of an answer prompt.
pub fn render_context(retrieved: &[RetrievedChunk], structure: &RepoStructure) -> String {
    retrieved
        .iter()
        .map(|chunk| {
            let mut info = String::new();
            if let Some(file) = structure.get(&chunk.path) {
                if !file.functions.is_empty() {
                    let names: Vec<&str> =
                        file.functions.iter().take(3).map(|f| f.name.as_str()).collect();
                    let _ = write!(info, "\nFunctions in this file: {}", names.join(", "));
                }
                if !file.classes.is_empty() {
                    let names: Vec<&str> =
                        file.classes.iter().take(3).map(|c| c.name.as_str()).collect();
                    let _ = write!(info, "\nClasses in this file: {}", names.join(", "));
                }
            }
            format!(
                "### File: {} ({}){}\n```{}\n{}\n```",
                chunk.path, chunk.extension, info, chunk.extension, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn answer_prompt(
    question: &str,
    retrieved: &[RetrievedChunk],
    structure: &RepoStructure,
) -> String {
    format!(
        r#"You are an expert software developer and code analyst. Answer the user's question about this codebase using the provided context.

CONTEXT (Relevant code files and their structure):
{context}

CODEBASE STRUCTURE SUMMARY:
{structure}

QUESTION: {question}

INSTRUCTIONS:
1. Use ONLY the provided code context to answer
2. If the answer isn't in the context, say "I don't see information about that in the provided code"
3. Reference specific file paths and line numbers when relevant
4. Explain code patterns, architecture decisions, and implementation details
5. Provide practical insights for developers working with this codebase
6. If asked about implementation, suggest approaches based on the existing patterns

Provide a comprehensive, developer-friendly answer.
"#,
        context = render_context(retrieved, structure),
        structure = structure_excerpt(structure, 5),
        question = question,
    )
}

pub fn explain_prompt(path: &str, file: &FileStructure) -> String {
    let structure = serde_json::to_string_pretty(file).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"Analyze this code file and provide a detailed explanation for developers.

FILE: {path}

CODE STRUCTURE:
{structure}

Please provide:
1. **File Purpose**: What does this file do?
2. **Key Components**: Functions, classes, and their purposes
3. **Dependencies**: What does this file import/depend on?
4. **Usage**: How would other developers use this file?
5. **Architecture**: How does it fit into the overall project?

Format your response in markdown.
"#
    )
}

fn doc_preview(doc: &str) -> String {
    format!("{}...", take_chars(doc, 100))
}

/// Markdown analysis of one file rendered without an LLM.
///
/// `content` is the file text when it could be read.
pub fn basic_file_analysis(path: &str, file: &FileStructure, content: Option<&str>) -> String {
    let (total_lines, non_empty, size) = match content {
        Some(text) => (
            text.lines().count().to_string(),
            text.lines()
                .filter(|l| !l.trim().is_empty())
                .count()
                .to_string(),
            format!("{} characters", text.chars().count()),
        ),
        None => ("0".to_string(), "0".to_string(), "Unknown".to_string()),
    };
    let label = extension_label(path);

    let mut out = format!(
        "## File Analysis: {}\n\n\
         ### Basic Information\n\
         - **File Type**: {}\n\
         - **Total Lines**: {}\n\
         - **Non-empty Lines**: {}\n\
         - **File Size**: {}\n\n\
         ### Structure Analysis\n",
        path, label, total_lines, non_empty, size
    );

    if !file.functions.is_empty() {
        out.push_str("\n#### Functions Found:\n");
        for func in file.functions.iter().take(10) {
            let _ = writeln!(out, "- **{}** (line {})", func.name, func.line);
            if !func.args.is_empty() {
                let _ = writeln!(out, "  - Arguments: {}", func.args.join(", "));
            }
            if !func.docstring.is_empty() {
                let _ = writeln!(out, "  - Docstring: {}", doc_preview(&func.docstring));
            }
        }
    }

    if !file.classes.is_empty() {
        out.push_str("\n#### Classes Found:\n");
        for class in file.classes.iter().take(5) {
            let _ = writeln!(out, "- **{}** (line {})", class.name, class.line);
            if !class.methods.is_empty() {
                let names: Vec<&str> = class.methods.iter().take(5).map(|m| m.name.as_str()).collect();
                let _ = writeln!(out, "  - Methods: {}", names.join(", "));
            }
            if !class.docstring.is_empty() {
                let _ = writeln!(out, "  - Docstring: {}", doc_preview(&class.docstring));
            }
        }
    }

    if !file.imports.is_empty() {
        out.push_str("\n#### Dependencies:\n");
        for import in file.imports.iter().take(10) {
            let _ = writeln!(out, "- `{}`", import);
        }
    }

    let has_components = !file.functions.is_empty() || !file.classes.is_empty();
    let has_docs = file.functions.iter().any(|f| !f.docstring.is_empty());
    let _ = write!(
        out,
        "\n### Usage Tips\n\
         - This appears to be a {} file\n\
         - {}\n\
         - {}\n",
        label,
        if has_components {
            "Contains functions and classes"
        } else {
            "Basic file structure"
        },
        if has_docs {
            "Has documentation strings"
        } else {
            "No documentation strings found"
        },
    );

    out
}
