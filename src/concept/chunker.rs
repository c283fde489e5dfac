//! Markdown chunking.
//!
//! A line starting with one to three `#` opens a new section. Short sections are
//! folded into the previous chunk, long ones are split at blank lines, and anything
//! still under the minimum after that is dropped.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::{ChunkingConfig, IndexConfig};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s+").expect("valid heading regex"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n+").expect("valid paragraph regex"));

/// A contiguous span of a source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    /// Path relative to the workspace, `/`-separated.
    pub path: String,
    /// 1-indexed line the chunk starts on.
    pub start_line: usize,
    /// First path segment (`memory`, `bank`, ...).
    pub source: String,
    /// Nearest section heading, or empty.
    pub heading: String,
}

/// Split markdown `content` into chunks.
pub fn chunk_text(content: &str, path: &str, source: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let sections = split_sections(content, path, source);

    let mut merged: Vec<Chunk> = Vec::with_capacity(sections.len());
    for section in sections {
        let len = char_len(&section.text);
        if len < config.min_chunk_chars {
            match merged.last_mut() {
                Some(prev) => {
                    prev.text.push_str("\n\n");
                    prev.text.push_str(&section.text);
                }
                None => merged.push(section),
            }
        } else if len > config.max_chunk_chars {
            merged.extend(split_large(section, config.max_chunk_chars));
        } else {
            merged.push(section);
        }
    }

    merged.retain(|c| char_len(&c.text) >= config.min_chunk_chars);
    merged
}

fn split_sections(content: &str, path: &str, source: &str) -> Vec<Chunk> {
    let mut sections = Vec::new();
    let mut heading = String::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut start = 1;

    let flush = |lines: &[&str], start: usize, heading: &str, out: &mut Vec<Chunk>| {
        let text = lines.join("\n");
        let text = text.trim();
        if !text.is_empty() {
            out.push(Chunk {
                text: text.to_string(),
                path: path.to_string(),
                start_line: start,
                source: source.to_string(),
                heading: heading.to_string(),
            });
        }
    };

    for (i, line) in content.split('\n').enumerate() {
        let line_no = i + 1;
        let is_heading = HEADING.is_match(line);
        if is_heading && !lines.is_empty() {
            flush(&lines, start, &heading, &mut sections);
            heading = heading_text(line);
            lines.clear();
            lines.push(line);
            start = line_no;
        } else {
            if lines.is_empty() && line.trim().is_empty() {
                continue;
            }
            if lines.is_empty() {
                start = line_no;
            }
            lines.push(line);
            if heading.is_empty() && is_heading {
                heading = heading_text(line);
            }
        }
    }
    flush(&lines, start, &heading, &mut sections);
    sections
}

fn heading_text(line: &str) -> String {
    line.trim_start_matches('#').trim().to_string()
}

/// Greedily pack paragraphs up to `max_chars`, recomputing each piece's start line.
fn split_large(chunk: Chunk, max_chars: usize) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut start = chunk.start_line;

    for (offset, para) in paragraphs(&chunk.text) {
        if !current.is_empty() && char_len(&current) + char_len(para) > max_chars {
            out.push(Chunk {
                text: current.trim().to_string(),
                start_line: start,
                ..chunk.clone()
            });
            current = para.to_string();
            start = chunk.start_line + chunk.text[..offset].matches('\n').count();
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
        }
    }

    if !current.trim().is_empty() {
        out.push(Chunk {
            text: current.trim().to_string(),
            start_line: start,
            ..chunk
        });
    }
    out
}

/// Paragraphs of `text` with their byte offsets.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut pos = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        out.push((pos, &text[pos..m.start()]));
        pos = m.end();
    }
    out.push((pos, &text[pos..]));
    out
}

/// Read and chunk one file. Unreadable files yield no chunks.
pub fn chunk_file(file: &Path, workspace: &Path, config: &ChunkingConfig) -> Vec<Chunk> {
    let bytes = match std::fs::read(file) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "skipping unreadable file");
            return Vec::new();
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let rel = relative_path(file, workspace);
    let source = rel.split('/').next().unwrap_or("unknown").to_string();
    chunk_text(&content, &rel, &source, config)
}

/// Every `.md` file under the configured sources, sorted by path.
///
/// Skips directories named in `skip_dirs`, files named in `skip_files`, and files
/// larger than `max_file_bytes`. Missing source directories are ignored.
pub fn discover_files(workspace: &Path, config: &IndexConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for source in &config.sources {
        let root = workspace.join(source);
        if !root.is_dir() {
            tracing::debug!(path = %root.display(), "source directory missing");
            continue;
        }
        let walker = WalkDir::new(&root).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.depth() > 0
                && config.skip_dirs.iter().any(|d| e.file_name() == d.as_str()))
        });
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if config.skip_files.iter().any(|f| f == name.as_ref()) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.len() <= config.max_file_bytes => files.push(path.to_path_buf()),
                Ok(meta) => {
                    tracing::debug!(path = %path.display(), bytes = meta.len(), "skipping large file")
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot stat file"),
            }
        }
    }
    files.sort();
    files
}

/// `file` relative to `workspace`, `/`-separated.
pub(crate) fn relative_path(file: &Path, workspace: &Path) -> String {
    let rel = file.strip_prefix(workspace).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            min_chunk_chars: 20,
            max_chunk_chars: 80,
        }
    }

    #[test]
    fn splits_on_headings_with_start_lines() {
        let text = "# Alpha\nalpha body text that is long enough\n\n## Beta\nbeta body text that is long enough too";
        let chunks = chunk_text(text, "memory/a.md", "memory", &config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading, "Alpha");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[1].heading, "Beta");
        assert_eq!(chunks[1].start_line, 4);
        assert!(chunks[1].text.starts_with("## Beta"));
    }

    #[test]
    fn short_sections_merge_into_previous() {
        let text = "# Alpha\nalpha body text that is long enough\n## B\ntiny";
        let chunks = chunk_text(text, "p", "s", &config());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.ends_with("## B\ntiny"));
    }

    #[test]
    fn lone_short_section_is_dropped() {
        assert!(chunk_text("# Hi\nshort", "p", "s", &config()).is_empty());
        assert!(chunk_text("", "p", "s", &config()).is_empty());
    }

    #[test]
    fn long_sections_split_at_paragraphs() {
        let para = "x".repeat(50);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_text(&text, "p", "s", &config());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[2].start_line, 5);
        for c in &chunks {
            assert!(c.text.chars().count() <= 80);
        }
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let text = "\n\n\nplain body text long enough to keep";
        let chunks = chunk_text(text, "p", "s", &config());
        assert_eq!(chunks[0].start_line, 4);
        assert_eq!(chunks[0].heading, "");
    }

    #[test]
    fn discovers_markdown_and_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        std::fs::create_dir_all(ws.join("memory/archive")).unwrap();
        std::fs::create_dir_all(ws.join("bank")).unwrap();
        std::fs::write(ws.join("memory/b.md"), "b").unwrap();
        std::fs::write(ws.join("memory/a.md"), "a").unwrap();
        std::fs::write(ws.join("memory/notes.txt"), "t").unwrap();
        std::fs::write(ws.join("memory/memory-index.md"), "i").unwrap();
        std::fs::write(ws.join("memory/archive/old.md"), "o").unwrap();
        std::fs::write(ws.join("bank/big.md"), "y".repeat(600_000)).unwrap();

        let files = discover_files(ws, &IndexConfig::default());
        assert_eq!(files, vec![ws.join("memory/a.md"), ws.join("memory/b.md")]);
    }

    #[test]
    fn chunk_file_derives_source_from_first_segment() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        std::fs::create_dir_all(ws.join("bank/people")).unwrap();
        let file = ws.join("bank/people/ana.md");
        std::fs::write(&file, "# Ana\nAna likes long walks by the river.").unwrap();

        let chunks = chunk_file(&file, ws, &config());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "bank/people/ana.md");
        assert_eq!(chunks[0].source, "bank");
        assert!(chunk_file(&ws.join("missing.md"), ws, &config()).is_empty());
    }
}
