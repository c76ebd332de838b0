//! Languages known to the engine and the registry mapping file names to
//! them.
//!
//! A [`Language`] is the index under which items are grouped for target
//! search: transformer functions only ever resolve against items of their
//! own language.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use splice_config::Config;
use splice_syntax::{Analyzer, LanguageParseError, SupportedLanguage, SyntaxError, TreeSitterAnalyzer};

use crate::transformer::TransformerAnalyzer;

/// Language of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    /// A transformer-function source.
    Transformer,
    /// A target item language.
    Target(SupportedLanguage),
}

impl Language {
    /// Returns `true` for transformer-function sources.
    #[must_use]
    pub const fn is_transformer(self) -> bool {
        matches!(self, Self::Transformer)
    }

    /// The target language, if this is not the transformer language.
    #[must_use]
    pub const fn target(self) -> Option<SupportedLanguage> {
        match self {
            Self::Transformer => None,
            Self::Target(language) => Some(language),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformer => f.write_str("transformer"),
            Self::Target(language) => language.fmt(f),
        }
    }
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.trim().eq_ignore_ascii_case("transformer") {
            return Ok(Self::Transformer);
        }
        input.parse().map(Self::Target)
    }
}

/// Maps file names to languages and hands out analyzers.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    transformer_suffix: String,
    transformer: TransformerAnalyzer,
    analyzers: BTreeMap<SupportedLanguage, TreeSitterAnalyzer>,
}

impl LanguageRegistry {
    /// Creates a registry recognising `transformer_suffix` (without the
    /// dot) as the transformer-source extension.
    ///
    /// # Errors
    ///
    /// Fails when a Tree-sitter grammar cannot be loaded.
    pub fn new(transformer_suffix: impl Into<String>) -> Result<Self, SyntaxError> {
        let mut analyzers = BTreeMap::new();
        for &language in SupportedLanguage::all() {
            analyzers.insert(language, TreeSitterAnalyzer::new(language)?);
        }
        Ok(Self {
            transformer_suffix: transformer_suffix.into(),
            transformer: TransformerAnalyzer::new(),
            analyzers,
        })
    }

    /// Creates a registry using the configured transformer suffix.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_config(config: &Config) -> Result<Self, SyntaxError> {
        Self::new(config.transformer_suffix())
    }

    /// The transformer-source extension, without the dot.
    #[must_use]
    pub fn transformer_suffix(&self) -> &str {
        &self.transformer_suffix
    }

    /// Classifies a file name.
    #[must_use]
    pub fn language_of(&self, file_name: &str) -> Option<Language> {
        if self.strip_transformer_suffix(file_name).is_some() {
            return Some(Language::Transformer);
        }
        extension_of(file_name)
            .and_then(SupportedLanguage::from_extension)
            .map(Language::Target)
    }

    /// Language hint carried by a transformer file name, as in
    /// `home.ts.t`.
    #[must_use]
    pub fn hint_of(&self, file_name: &str) -> Option<SupportedLanguage> {
        self.strip_transformer_suffix(file_name)
            .and_then(extension_of)
            .and_then(SupportedLanguage::from_extension)
    }

    /// File name of a transformer source without its suffix and language
    /// hint: `home.ts.t` gives `home`.
    #[must_use]
    pub fn source_name<'a>(&self, file_name: &'a str) -> &'a str {
        let Some(stem) = self.strip_transformer_suffix(file_name) else {
            return file_name;
        };
        match stem.rsplit_once('.') {
            Some((name, ext)) if SupportedLanguage::from_extension(ext).is_some() => name,
            _ => stem,
        }
    }

    /// Returns `true` when `name` ends in a target language extension.
    #[must_use]
    pub fn is_language_file(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| SupportedLanguage::from_extension(ext).is_some())
    }

    /// Returns `true` for extensions of target languages and the
    /// transformer suffix.
    #[must_use]
    pub fn recognises_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(&self.transformer_suffix)
            || SupportedLanguage::from_extension(extension).is_some()
    }

    /// Analyzer for a language.
    #[must_use]
    pub fn analyzer(&self, language: Language) -> Option<&dyn Analyzer> {
        match language {
            Language::Transformer => Some(&self.transformer),
            Language::Target(target) => self
                .analyzers
                .get(&target)
                .map(|analyzer| analyzer as &dyn Analyzer),
        }
    }

    /// The transformer-source analyzer.
    #[must_use]
    pub const fn transformer(&self) -> &TransformerAnalyzer {
        &self.transformer
    }

    fn strip_transformer_suffix<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        (!stem.is_empty() && ext.eq_ignore_ascii_case(&self.transformer_suffix)).then_some(stem)
    }
}

/// Extension of the last path segment, without the dot.
pub(crate) fn extension_of(name: &str) -> Option<&str> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    file_name
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext)
}
