use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn all() -> &'static [Self] {
        &[Self::En, Self::Ru]
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|language| language.code().eq_ignore_ascii_case(code.trim()))
    }

    fn source(self) -> &'static str {
        match self {
            Self::En => include_str!("../../assets/i18n/en.json"),
            Self::Ru => include_str!("../../assets/i18n/ru.json"),
        }
    }
}

type Catalog = HashMap<String, String>;

/// Every bundled catalog, parsed on first use.
fn catalogs() -> &'static HashMap<Language, Catalog> {
    static CATALOGS: OnceLock<HashMap<Language, Catalog>> = OnceLock::new();
    CATALOGS.get_or_init(|| {
        Language::all()
            .iter()
            .map(|&language| {
                let catalog = serde_json::from_str(language.source()).unwrap_or_else(|err| {
                    panic!("bundled '{}' catalog is not a string map: {err}", language.code())
                });
                (language, catalog)
            })
            .collect()
    })
}

fn lookup(language: Language, key: &str) -> Option<&'static str> {
    catalogs()
        .get(&language)
        .and_then(|catalog| catalog.get(key))
        .map(String::as_str)
}

/// Text for `key` in `language`. Missing entries fall back to English, then
/// to the key itself.
pub fn tr(language: Language, key: &str) -> &str {
    lookup(language, key)
        .or_else(|| lookup(Language::En, key))
        .unwrap_or(key)
}

/// Like [`tr`], with every `{name}` placeholder replaced by its value.
/// Placeholders without a value are left as they are.
pub fn format(language: Language, key: &str, args: &[(&str, String)]) -> String {
    args.iter()
        .fold(tr(language, key).to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}
