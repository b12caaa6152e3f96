//! Reference-comment data model: the catalogue entries
//! [`crate::comments::repository::CommentRepository`] serves to the
//! selection stage.

use serde::{Deserialize, Serialize};

/// Maximum length a reference comment's text is truncated to at load time.
pub const MAX_COMMENT_TEXT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    WeatherComment,
    Advice,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentKind::WeatherComment => "weather_comment",
            CommentKind::Advice => "advice",
        }
    }

    pub const ALL: [CommentKind; 2] = [CommentKind::WeatherComment, CommentKind::Advice];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
    RainySeason,
    Typhoon,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
            Season::RainySeason => "rainy_season",
            Season::Typhoon => "typhoon",
        }
    }

    pub const ALL: [Season; 6] = [
        Season::Spring,
        Season::Summer,
        Season::Autumn,
        Season::Winter,
        Season::RainySeason,
        Season::Typhoon,
    ];

    /// The month -> relevant-seasons table from SPEC_FULL §4.5, verbatim
    /// from the distilled spec.
    pub fn relevant_for_month(month: u32) -> Vec<Season> {
        match month {
            1 | 2 | 12 => vec![Season::Winter],
            3 => vec![Season::Winter, Season::Spring],
            4 => vec![Season::Spring],
            5 => vec![Season::Spring, Season::RainySeason],
            6 => vec![Season::RainySeason, Season::Summer],
            7 | 8 => vec![Season::Summer, Season::RainySeason, Season::Typhoon],
            9 => vec![Season::Summer, Season::Typhoon, Season::Autumn],
            10 | 11 => vec![Season::Autumn, Season::Typhoon],
            _ => vec![],
        }
    }
}

/// One human-authored reference comment loaded from a CSV partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceComment {
    pub text: String,
    pub kind: CommentKind,
    pub season: Season,
    pub source_row: usize,
    pub count: i64,
}

impl ReferenceComment {
    /// Truncate to [`MAX_COMMENT_TEXT_LEN`] chars if needed, returning
    /// whether truncation happened (the caller logs a warning when it did).
    pub fn truncate_text(text: &str) -> (String, bool) {
        let char_count = text.chars().count();
        if char_count <= MAX_COMMENT_TEXT_LEN {
            (text.to_string(), false)
        } else {
            (text.chars().take(MAX_COMMENT_TEXT_LEN).collect(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevant_seasons_january_is_winter_only() {
        assert_eq!(Season::relevant_for_month(1), vec![Season::Winter]);
    }

    #[test]
    fn relevant_seasons_july_is_summer_rainy_typhoon() {
        assert_eq!(
            Season::relevant_for_month(7),
            vec![Season::Summer, Season::RainySeason, Season::Typhoon]
        );
    }

    #[test]
    fn truncate_text_leaves_short_text_untouched() {
        let (text, truncated) = ReferenceComment::truncate_text("short");
        assert_eq!(text, "short");
        assert!(!truncated);
    }

    #[test]
    fn truncate_text_clips_to_max_len() {
        let long = "あ".repeat(250);
        let (text, truncated) = ReferenceComment::truncate_text(&long);
        assert_eq!(text.chars().count(), MAX_COMMENT_TEXT_LEN);
        assert!(truncated);
    }
}
