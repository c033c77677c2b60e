use thiserror::Error;

/// Failure of a marketplace REST call.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// 401: the access token is expired or revoked.
    #[error("marketplace rejected the access token (401)")]
    Unauthorized,

    #[error("marketplace returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("marketplace request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected marketplace response: {0}")]
    Decode(String),
}

/// Failure of an OAuth token-endpoint call.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected token response: {0}")]
    Decode(String),
}

/// Failure of a text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation API returned no content")]
    EmptyResponse,

    #[error("unexpected generation response: {0}")]
    Decode(String),
}

/// Why a token refresh ended in `RefreshFailed`.
#[derive(Debug, Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error(transparent)]
    Provider(#[from] OAuthError),

    #[error("token response is missing access_token or refresh_token")]
    MissingTokens,

    #[error("credential store error: {0}")]
    Store(String),
}

/// Coarse classification the worker loop branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-actionable event: dropped without a report.
    Malformed,
    /// Credentials could not be made valid.
    Authorization,
    /// An external dependency failed.
    Upstream,
    /// The notification pointed at nothing left to answer.
    Exhaustion,
    /// Anything unexpected on our side.
    Internal,
}

/// Terminal failure of one notification.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("notification has no user_id")]
    MissingAccount,

    #[error("token refresh failed for account {account}: {reason}")]
    RefreshFailed { account: String, reason: RefreshFailure },

    #[error("failed to fetch questions for account {account}: {source}")]
    FetchQuestions {
        account: String,
        #[source]
        source: MarketplaceError,
    },

    #[error("no unanswered question found for account {account}")]
    NoQuestions { account: String },

    #[error("failed to classify question {question_id}: {source}")]
    Classify {
        question_id: String,
        #[source]
        source: GenerationError,
    },

    #[error("failed to draft answer for question {question_id}: {source}")]
    Draft {
        question_id: String,
        #[source]
        source: GenerationError,
    },

    #[error("failed to post answer for question {question_id}: {source}")]
    PostAnswer {
        question_id: String,
        #[source]
        source: MarketplaceError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAccount => ErrorKind::Malformed,
            Self::RefreshFailed { reason: RefreshFailure::Store(_), .. } => ErrorKind::Internal,
            Self::RefreshFailed { .. } => ErrorKind::Authorization,
            Self::FetchQuestions { source: MarketplaceError::Unauthorized, .. } => ErrorKind::Authorization,
            Self::FetchQuestions { .. }
            | Self::Classify { .. }
            | Self::Draft { .. }
            | Self::PostAnswer { .. } => ErrorKind::Upstream,
            Self::NoQuestions { .. } => ErrorKind::Exhaustion,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure goes to the error sink.
    pub fn is_reportable(&self) -> bool {
        self.kind() != ErrorKind::Malformed
    }
}
