// HTTP wire contract between the annotator page and the daemon.

use serde::{Deserialize, Serialize};

/// Every state-changing operation the daemon accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SaveAnnotations,
    SaveResultImage,
    SaveBackgroundImage,
    LocateScript,
    RefreshFromKnownSource,
    RefreshByFilename,
    SetSourcePath,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Self::SaveAnnotations,
        Self::SaveResultImage,
        Self::SaveBackgroundImage,
        Self::LocateScript,
        Self::RefreshFromKnownSource,
        Self::RefreshByFilename,
        Self::SetSourcePath,
    ];

    /// The fixed POST path for this operation.
    pub const fn path(self) -> &'static str {
        match self {
            Self::SaveAnnotations => "/save",
            Self::SaveResultImage => "/save-image",
            Self::SaveBackgroundImage => "/save-background",
            Self::LocateScript => "/search-script",
            Self::RefreshFromKnownSource => "/refresh-from-source",
            Self::RefreshByFilename => "/refresh-by-filename",
            Self::SetSourcePath => "/set-source-path",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SaveAnnotations => "save-annotations",
            Self::SaveResultImage => "save-result-image",
            Self::SaveBackgroundImage => "save-background-image",
            Self::LocateScript => "locate-script",
            Self::RefreshFromKnownSource => "refresh-from-known-source",
            Self::RefreshByFilename => "refresh-by-filename",
            Self::SetSourcePath => "set-source-path",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.path() == path)
    }

    /// Shape of the JSON body sent back when the operation fails.
    pub const fn failure_envelope(self) -> FailureEnvelope {
        match self {
            Self::SaveAnnotations
            | Self::SaveResultImage
            | Self::SaveBackgroundImage
            | Self::LocateScript => FailureEnvelope::Bare,
            Self::RefreshFromKnownSource | Self::RefreshByFilename | Self::SetSourcePath => {
                FailureEnvelope::Flagged
            }
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an error is wrapped in the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureEnvelope {
    /// `{"error": "..."}`
    Bare,
    /// `{"success": false, "error": "..."}`
    Flagged,
}

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocateScriptRequest {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshByFilenameRequest {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetSourcePathRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// ── Responses ──────────────────────────────────────────────────────

/// Returned by the three save operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResponse {
    pub success: bool,
    pub path: String,
}

/// Returned by locate-script whether or not a script was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocateScriptResponse {
    pub found: bool,
    pub script: Option<String>,
    pub filename: String,
}

/// Returned by the refresh and set-source operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResponse {
    pub success: bool,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedErrorResponse {
    pub success: bool,
    pub error: String,
}
