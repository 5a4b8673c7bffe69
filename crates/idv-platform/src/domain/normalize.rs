//! Field Normalizer
//!
//! Canonical forms used for every comparison between a stored claim and a
//! verified document. Both sides go through the same functions.

/// Normalizes names and rendered age labels
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    /// Lowercased, longest first so "ans" is tried before "an"
    age_suffixes: Vec<String>,
    /// First configured suffix, used when rendering
    render_suffix: Option<String>,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new(["ans"])
    }
}

impl FieldNormalizer {
    pub fn new<I, S>(age_suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let configured: Vec<String> = age_suffixes
            .into_iter()
            .map(|s| Self::normalize(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        let render_suffix = configured.first().cloned();

        let mut suffixes = configured;
        suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        suffixes.dedup();
        Self {
            age_suffixes: suffixes,
            render_suffix,
        }
    }

    /// Lowercase and trim
    pub fn normalize(text: &str) -> String {
        text.to_lowercase().trim().to_string()
    }

    /// Normalize an optional document field; absent becomes empty
    pub fn normalize_optional(text: Option<&str>) -> String {
        text.map(Self::normalize).unwrap_or_default()
    }

    /// Normalize an age label and strip its unit suffix: "30 Ans " -> "30"
    pub fn normalize_age_label(&self, label: &str) -> String {
        let mut value = Self::normalize(label);
        while let Some(stripped) = self
            .age_suffixes
            .iter()
            .find_map(|suffix| value.strip_suffix(suffix.as_str()))
        {
            value = stripped.trim().to_string();
        }
        value
    }

    /// Render an age the way stored labels are written
    pub fn render_age(&self, age: u32) -> String {
        match self.render_suffix {
            Some(ref suffix) => format!("{} {}", age, suffix),
            None => age.to_string(),
        }
    }
}
