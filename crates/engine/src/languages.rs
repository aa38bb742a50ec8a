use serde::Serialize;

/// Built-in (name, ISO 639-2 code) pairs
pub const BUILTIN_LANGUAGES: &[(&str, &str)] = &[
    ("English", "eng"),
    ("Spanish", "spa"),
    ("French", "fra"),
    ("German", "ger"),
    ("Japanese", "jpn"),
    ("Arabic", "ara"),
    ("Russian", "rus"),
    ("Portuguese", "por"),
    ("Chinese", "chi"),
    ("Italian", "ita"),
    ("Korean", "kor"),
    ("Hindi", "hin"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: String,
    pub code: String,
    pub builtin: bool,
}

/// Languages offered for companion tagging, sorted by name.
///
/// Codes are unique ignoring case; when a custom entry repeats a code the
/// earlier entry (built-ins first) is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageTable {
    languages: Vec<Language>,
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::with_custom(&[])
    }
}

impl LanguageTable {
    pub fn with_custom(custom: &[(String, String)]) -> Self {
        let mut table = Self {
            languages: BUILTIN_LANGUAGES
                .iter()
                .map(|(name, code)| Language { name: name.to_string(), code: code.to_string(), builtin: true })
                .collect(),
        };
        for (name, code) in custom {
            table.add(name, code);
        }
        table.sort();
        table
    }

    fn sort(&mut self) {
        self.languages.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
    }

    /// Add a custom language; returns false if the code is already present
    /// or either field is blank
    pub fn add(&mut self, name: &str, code: &str) -> bool {
        let (name, code) = (name.trim(), code.trim());
        if name.is_empty() || code.is_empty() || self.find(code).is_some() {
            return false;
        }
        self.languages.push(Language { name: name.to_string(), code: code.to_string(), builtin: false });
        self.sort();
        true
    }

    /// Remove a custom language by code; built-ins are never removed
    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.languages.len();
        self.languages.retain(|l| l.builtin || !l.code.eq_ignore_ascii_case(code));
        self.languages.len() != before
    }

    fn find(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code.eq_ignore_ascii_case(code))
    }

    /// Code for a language name (case-insensitive), or the input itself when
    /// it already is a known code
    pub fn lookup_code(&self, name_or_code: &str) -> Option<&str> {
        let needle = name_or_code.trim();
        self.languages
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(needle))
            .or_else(|| self.find(needle))
            .map(|l| l.code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
