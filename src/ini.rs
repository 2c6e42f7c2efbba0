//! Reader and writer for the section based key/value text format used by
//! event files and by simulation reports.
//!
//! ```text
//! [new_junction]
//! time = 0
//! id = j1
//! ```

use std::fmt;
use std::io::{self, BufRead, Write};

use lazy_static::lazy_static;
use regex::Regex;

use crate::simulation::ParseError;

lazy_static! {
    static ref SECTION: Regex = Regex::new(r"^\s*\[([^\]]*)\]\s*$").unwrap();
    static ref KEY_VALUE: Regex = Regex::new(r"^\s*([^=]*)=(.*)$").unwrap();
    static ref COMMENT: Regex = Regex::new(r"^[;,#]").unwrap();
}

/// One `[tag]` block with its ordered entries
#[derive(Debug, Clone, Default)]
pub struct IniSection {
    tag: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            entries: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Sets a value, keeping the position of a key that already exists
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn store<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "[{}]", self.tag)?;
        for (key, value) in &self.entries {
            writeln!(out, "{} = {}", key, value)?;
        }
        Ok(())
    }
}

/// Sections are equal up to the order of their entries
impl PartialEq for IniSection {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag || self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(key, value)| other.get(key) == Some(value.as_str()))
    }
}

impl Eq for IniSection {}

impl fmt::Display for IniSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.tag)?;
        for (key, value) in &self.entries {
            writeln!(f, "{} = {}", key, value)?;
        }
        Ok(())
    }
}

/// An ordered list of sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
    sections: Vec<IniSection>,
}

impl Ini {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every section from `reader`. Sections whose tag starts with `!`
    /// are checked for syntax but left out.
    pub fn load<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut ini = Ini::new();
        let mut current: Option<IniSection> = None;

        for line in reader.lines() {
            let line = line.map_err(|e| ParseError::new("input", e.to_string()))?;

            if line.trim().is_empty() || COMMENT.is_match(&line) {
                continue;
            }

            if let Some(caps) = SECTION.captures(&line) {
                if let Some(done) = current.take() {
                    ini.push_unless_ignored(done);
                }
                current = Some(IniSection::new(caps[1].trim()));
                continue;
            }

            match (current.as_mut(), KEY_VALUE.captures(&line)) {
                (Some(section), Some(caps)) => {
                    section.set_value(caps[1].trim(), caps[2].trim());
                }
                _ => return Err(ParseError::new(line.clone(), "Syntax error")),
            }
        }

        if let Some(done) = current.take() {
            ini.push_unless_ignored(done);
        }
        Ok(ini)
    }

    fn push_unless_ignored(&mut self, section: IniSection) {
        if !section.tag.starts_with('!') {
            self.sections.push(section);
        }
    }

    pub fn add_section(&mut self, section: IniSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    /// Writes every section followed by a blank line
    pub fn store<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        for section in &self.sections {
            section.store(out)?;
            writeln!(out)?;
        }
        Ok(())
    }
}
