//! Patterns that identify a source file inside a compile command.

use regex_lite::Regex;

use crate::error::MinerResult;
use crate::escape::backslash_escape;

/// How the compiler is told which file to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    /// Swift: `-primary-file <path>`.
    Swift,
    /// Objective-C/C++: `-c <path>`.
    ObjectiveC,
    /// Unknown extension: either form.
    Other,
    /// Storyboard, xib or nib: compiled by ibtool.
    InterfaceBuilder,
}

impl SourceLanguage {
    pub fn of(source_file: &str) -> Self {
        let ext = source_file.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext {
            "swift" => SourceLanguage::Swift,
            "m" | "mm" => SourceLanguage::ObjectiveC,
            "storyboard" | "xib" | "nib" => SourceLanguage::InterfaceBuilder,
            _ => SourceLanguage::Other,
        }
    }

    fn compiler_flag(&self) -> &'static str {
        match self {
            SourceLanguage::Swift => " -primary-file ",
            SourceLanguage::ObjectiveC => " -c ",
            SourceLanguage::Other | SourceLanguage::InterfaceBuilder => " -(?:primary-file|c) ",
        }
    }
}

/// True for files compiled by ibtool rather than linked as objects.
pub fn is_interface_builder(source_file: &str) -> bool {
    SourceLanguage::of(source_file) == SourceLanguage::InterfaceBuilder
}

/// Matcher for one source file, either by full path or by bare file name.
#[derive(Debug, Clone)]
pub struct FileFilter {
    source_file: String,
    filename: String,
    has_full_path: bool,
    language: SourceLanguage,
    file_pattern: String,
}

impl FileFilter {
    pub fn new(source_file: &str) -> Self {
        let has_full_path = source_file.starts_with('/');
        let language = SourceLanguage::of(source_file);

        let (filename, quoted, escaped) = if has_full_path {
            let filename = source_file
                .rsplit('/')
                .next()
                .unwrap_or(source_file)
                .to_string();
            (
                filename,
                regex_lite::escape(source_file),
                regex_lite::escape(&backslash_escape(source_file)),
            )
        } else {
            let mut name = regex_lite::escape(source_file);
            if source_file.ends_with(".m") {
                name.push_str("m?");
            }
            (
                source_file.to_string(),
                format!(r#"/[^" ]+(?: [^" ]*)*?/{}"#, name),
                format!(r#"/[^" ]+(?:\\ [^" ]*)*?/{}"#, name),
            )
        };

        // paths are either double quoted (swift) or backslash escaped in logs
        let file_pattern = format!(r#"(?:"({})"|({}))"#, quoted, escaped);

        Self {
            source_file: source_file.to_string(),
            filename,
            has_full_path,
            language,
            file_pattern,
        }
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn has_full_path(&self) -> bool {
        self.has_full_path
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Pattern text used for compiler lines, also shown as error detail.
    pub fn compile_pattern(&self) -> String {
        format!("{}{}", self.language.compiler_flag(), self.file_pattern)
    }

    /// Regex matching a compiler invocation for this file. Group 1 holds a
    /// quoted path, group 2 an escaped one.
    pub fn compile_regex(&self) -> MinerResult<Regex> {
        Ok(Regex::new(&self.compile_pattern())?)
    }

    /// Regex matching the file anywhere on an ibtool line.
    pub fn file_regex(&self) -> MinerResult<Regex> {
        Ok(Regex::new(&self.file_pattern)?)
    }

    /// Cheap substring test applied before any regex work.
    pub fn may_mention(&self, line: &str) -> bool {
        if self.has_full_path {
            line.contains(&self.filename) || line.contains(&backslash_escape(&self.filename))
        } else {
            let stem = self.filename.trim_end_matches(".m");
            line.contains(stem)
        }
    }
}
