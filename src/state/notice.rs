use crate::state::i18n::{self, Language};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A toast-style message for the user, queued by the controllers and
/// drained by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: &'static str,
    pub count: Option<usize>,
    pub detail: Option<String>,
}

impl Notice {
    pub fn success(key: &'static str) -> Self {
        Self {
            level: NoticeLevel::Success,
            key,
            count: None,
            detail: None,
        }
    }

    pub fn error(key: &'static str, detail: impl ToString) -> Self {
        Self {
            level: NoticeLevel::Error,
            key,
            count: None,
            detail: Some(detail.to_string()),
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    pub fn render(&self, language: Language) -> String {
        let args: Vec<(&str, String)> = self
            .count
            .map(|count| ("count", count.to_string()))
            .into_iter()
            .collect();
        i18n::format(language, self.key, &args)
    }
}
