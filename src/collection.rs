//! Passage collections.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{IndexError, Result};

/// An in-memory collection of passages, addressed by 0-based pid.
#[derive(Debug, Clone)]
pub struct Collection {
    passages: Vec<String>,
}

impl Collection {
    /// Wrap an already-loaded list of passages.
    pub fn from_passages(passages: Vec<String>) -> Self {
        Self { passages }
    }

    /// Load a collection file, one passage per line.
    ///
    /// Lines of the form `<pid>\t<passage>[\t...]` (the common TSV export)
    /// contribute only the passage field; anything else is taken verbatim.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(IndexError::io("open", path))?;
        let reader = BufReader::new(file);

        let mut passages = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(IndexError::io("read", path))?;
            passages.push(parse_line(&line));
        }
        Ok(Self { passages })
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Whether the collection holds no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage text by pid.
    pub fn get(&self, pid: usize) -> &str {
        &self.passages[pid]
    }

    /// Contiguous pid range `[start, end)`, e.g. one chunk's passages.
    pub fn range(&self, start: usize, end: usize) -> &[String] {
        &self.passages[start..end]
    }

    /// Passages for an arbitrary (sorted) pid list.
    pub fn select(&self, pids: &[usize]) -> Vec<String> {
        pids.iter().map(|&pid| self.passages[pid].clone()).collect()
    }
}

fn parse_line(line: &str) -> String {
    if let Some((head, rest)) = line.split_once('\t') {
        if head.chars().all(|c| c.is_ascii_digit()) && !head.is_empty() {
            // TSV export: the leading pid is positional, not content.
            let passage = rest.split('\t').next().unwrap_or(rest);
            return passage.to_string();
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn plain_lines_kept_verbatim() {
        assert_eq!(parse_line("a plain passage"), "a plain passage");
    }

    #[test]
    fn tsv_pid_prefix_stripped() {
        assert_eq!(parse_line("17\tthe passage\ta title"), "the passage");
        assert_eq!(parse_line("not a pid\tstays whole"), "not a pid\tstays whole");
    }

    #[test]
    fn load_reads_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.tsv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0\tfirst passage").unwrap();
        writeln!(file, "1\tsecond passage").unwrap();
        drop(file);

        let collection = Collection::load(&path).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(1), "second passage");
    }
}
