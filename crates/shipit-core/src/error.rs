use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipitError {
    #[error("invalid branch prefix '{0}': expected one of {1}")]
    InvalidBranchPrefix(String, String),

    #[error("invalid branch name '{0}': must contain at least one of [a-z0-9._-]")]
    InvalidBranchName(String),

    #[error("invalid commit subject: {0}")]
    InvalidCommitSubject(String),

    #[error("refusing to push to protected branch '{0}'")]
    ProtectedBranch(String),

    #[error("{0}")]
    RebaseBlocked(String),

    #[error("rebase onto {upstream} failed; see {log}")]
    RebaseFailed { upstream: String, log: String },

    #[error("could not re-apply {stash_ref}; it was left in the stash list for manual recovery")]
    StashRestore { stash_ref: String },

    #[error("prepush checks failed after a remediation retry: {0}")]
    ChecksFailed(String),

    #[error("{label} failed (exit {exit_code}); see {log}")]
    CommandFailed {
        label: String,
        exit_code: i32,
        log: String,
    },

    #[error("working tree is still dirty after commit: {0}")]
    DirtyAfterCommit(String),

    #[error("unknown command alias: {0}")]
    UnknownCommand(String),

    #[error("command '{alias}' is missing a value for {{{{{placeholder}}}}}")]
    MissingPlaceholder { alias: String, placeholder: String },

    #[error("invalid answers file {path}: {reason}")]
    InvalidAnswers { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShipitError>;
