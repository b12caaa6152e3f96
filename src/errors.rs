//! Stable error taxonomy shared by every component.
//!
//! Every failure that can surface out of the pipeline is classified into one
//! of [`ErrorType`]'s variants. The classification happens once, at the
//! boundary where the error is produced or caught; it is never re-derived
//! downstream. `AppError` carries enough context to build a [`LocationResult`]
//! (see `crate::pipeline::state`) without ever raising a raw exception across
//! the batch boundary.
//!
//! [`LocationResult`]: crate::pipeline::state::LocationResult

use std::collections::HashMap;
use std::fmt;

/// The fixed set of failure categories the core ever reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    WeatherFetch,
    DataAccess,
    CacheError,
    LlmError,
    ValidationError,
    ParsingError,
    ConfigError,
    MissingCredential,
    NetworkError,
    TimeoutError,
    ApiError,
    RateLimitError,
    ApiResponseError,
    FileIoError,
    LocationNotFound,
    CommentGenerationError,
    MissingDataError,
    SystemError,
    UnknownError,
}

impl ErrorType {
    /// The taxonomy value as used on the wire (`LocationResult.error`, history log).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::WeatherFetch => "weather_fetch",
            ErrorType::DataAccess => "data_access",
            ErrorType::CacheError => "cache_error",
            ErrorType::LlmError => "llm_error",
            ErrorType::ValidationError => "validation_error",
            ErrorType::ParsingError => "parsing_error",
            ErrorType::ConfigError => "config_error",
            ErrorType::MissingCredential => "missing_credential",
            ErrorType::NetworkError => "network_error",
            ErrorType::TimeoutError => "timeout_error",
            ErrorType::ApiError => "api_error",
            ErrorType::RateLimitError => "rate_limit_error",
            ErrorType::ApiResponseError => "api_response_error",
            ErrorType::FileIoError => "file_io_error",
            ErrorType::LocationNotFound => "location_not_found",
            ErrorType::CommentGenerationError => "comment_generation_error",
            ErrorType::MissingDataError => "missing_data_error",
            ErrorType::SystemError => "system_error",
            ErrorType::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language selector for [`AppError::user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Ja,
    En,
}

fn localized_message(error_type: ErrorType, lang: Lang) -> &'static str {
    use ErrorType::*;
    match (error_type, lang) {
        (WeatherFetch, Lang::Ja) => "天気データの取得エラー",
        (WeatherFetch, Lang::En) => "Weather data fetch error",
        (DataAccess, Lang::Ja) => "データアクセスエラー",
        (DataAccess, Lang::En) => "Data access error",
        (CacheError, Lang::Ja) => "キャッシュエラー",
        (CacheError, Lang::En) => "Cache error",
        (LlmError, Lang::Ja) => "AI処理エラー",
        (LlmError, Lang::En) => "AI processing error",
        (ValidationError, Lang::Ja) => "検証エラー",
        (ValidationError, Lang::En) => "Validation error",
        (ParsingError, Lang::Ja) => "データ解析エラー",
        (ParsingError, Lang::En) => "Data parsing error",
        (ConfigError, Lang::Ja) => "設定エラー",
        (ConfigError, Lang::En) => "Configuration error",
        (MissingCredential, Lang::Ja) => "認証情報が見つかりません",
        (MissingCredential, Lang::En) => "Missing credentials",
        (NetworkError, Lang::Ja) => "ネットワークエラー",
        (NetworkError, Lang::En) => "Network error",
        (TimeoutError, Lang::Ja) => "タイムアウトエラー",
        (TimeoutError, Lang::En) => "Timeout error",
        (ApiError, Lang::Ja) => "APIエラー",
        (ApiError, Lang::En) => "API error",
        (SystemError, Lang::Ja) => "システムエラー",
        (SystemError, Lang::En) => "System error",
        (UnknownError, Lang::Ja) => "不明なエラー",
        (UnknownError, Lang::En) => "Unknown error",
        (RateLimitError, Lang::Ja) => "レート制限エラー",
        (RateLimitError, Lang::En) => "Rate limit error",
        (ApiResponseError, Lang::Ja) => "API応答エラー",
        (ApiResponseError, Lang::En) => "API response error",
        (FileIoError, Lang::Ja) => "ファイル入出力エラー",
        (FileIoError, Lang::En) => "File I/O error",
        (LocationNotFound, Lang::Ja) => "場所が見つかりません",
        (LocationNotFound, Lang::En) => "Location not found",
        (CommentGenerationError, Lang::Ja) => "コメント生成エラー",
        (CommentGenerationError, Lang::En) => "Comment generation error",
        (MissingDataError, Lang::Ja) => "データが見つかりません",
        (MissingDataError, Lang::En) => "Missing data error",
    }
}

/// The single error type threaded through every component.
///
/// Construct via one of the named constructors rather than matching the
/// taxonomy by hand; each constructor pins down its `ErrorType` so
/// `classify()` can never drift from how the error was raised.
#[derive(Debug, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct AppError {
    pub error_type: ErrorType,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl AppError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn classify(&self) -> ErrorType {
        self.error_type
    }

    pub fn user_message(&self, lang: Lang) -> &'static str {
        localized_message(self.error_type, lang)
    }

    // Convenience constructors, one per taxonomy value actually raised
    // from more than one call site.
    pub fn weather_fetch(message: impl Into<String>) -> Self {
        Self::new(ErrorType::WeatherFetch, message)
    }
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::new(ErrorType::DataAccess, message)
    }
    pub fn cache_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::CacheError, message)
    }
    pub fn llm_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::LlmError, message)
    }
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ValidationError, message)
    }
    pub fn parsing_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ParsingError, message)
    }
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ConfigError, message)
    }
    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(ErrorType::MissingCredential, message)
    }
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::NetworkError, message)
    }
    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::TimeoutError, message)
    }
    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ApiError, message)
    }
    pub fn rate_limit_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::RateLimitError, message)
    }
    pub fn api_response_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ApiResponseError, message)
    }
    pub fn file_io_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::FileIoError, message)
    }
    pub fn location_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorType::LocationNotFound, message)
    }
    pub fn comment_generation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::CommentGenerationError, message)
    }
    pub fn missing_data_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::MissingDataError, message)
    }
    pub fn system_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::SystemError, message)
    }
    pub fn unknown_error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::UnknownError, message)
    }

    /// Classify a raw reqwest error the way `ForecastClient` needs to:
    /// network/timeout errors are retriable, everything else becomes
    /// `api_error`.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout_error(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::network_error(err.to_string())
        } else {
            Self::api_error(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_matches_taxonomy_values() {
        assert_eq!(ErrorType::WeatherFetch.as_str(), "weather_fetch");
        assert_eq!(ErrorType::MissingDataError.as_str(), "missing_data_error");
        assert_eq!(ErrorType::UnknownError.as_str(), "unknown_error");
    }

    #[test]
    fn user_message_falls_back_per_language() {
        let err = AppError::location_not_found("no such place");
        assert_eq!(err.user_message(Lang::Ja), "場所が見つかりません");
        assert_eq!(err.user_message(Lang::En), "Location not found");
    }

    #[test]
    fn classify_matches_constructor() {
        let err = AppError::rate_limit_error("too fast");
        assert_eq!(err.classify(), ErrorType::RateLimitError);
    }

    #[test]
    fn with_detail_is_additive() {
        let err = AppError::api_error("bad response")
            .with_detail("status", "500")
            .with_detail("url", "http://example.test");
        assert_eq!(err.details.get("status").map(String::as_str), Some("500"));
        assert_eq!(err.details.len(), 2);
    }
}
