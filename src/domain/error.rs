//! Error types for every pipeline component.
//!
//! Each component owns one thiserror enum inside its numeric block
//! (Core 1200, Director 1201, Driver 1202, commands 1210-1218, mount and
//! process tooling 1230-1235, tasks 1250-1260). A concrete error value is
//! `block * 100 + variant ordinal`, so the first critical error of a run maps
//! to a stable process exit code without a side table.

use thiserror::Error;

/// How bad a failure is, which decides propagation.
///
/// `Critical` sets the run's error status and causes remaining non-Shutdown
/// tasks to be skipped. `Warning` and `Error` are reported and the pipeline
/// proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened error value carried by directives and the driver's status cell.
///
/// Self-contained by design: a frontend renders it without querying back into
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Domain code, see module docs for the numbering scheme.
    pub code: u32,
    pub severity: Severity,
    /// Fixed description of the failure class.
    pub primary: String,
    /// Instance-specific detail, if any.
    pub secondary: Option<String>,
    /// Free-form blob (captured output, transfer reports).
    pub details: Option<String>,
}

impl ErrorDetails {
    pub fn new(code: u32, severity: Severity, primary: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            primary: primary.into(),
            secondary: None,
            details: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.primary)?;
        if let Some(s) = &self.secondary {
            write!(f, " {s}")?;
        }
        Ok(())
    }
}

/// Errors originating from the run context itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The standard launcher closed while running in companion mode.
    #[error("The standard launcher was closed while in companion mode.")]
    CompanionModeLauncherClose,

    /// A game server override cannot be honored while borrowing launcher services.
    #[error("Cannot enact game server override in companion mode.")]
    CompanionModeServerOverride,

    /// Bad global options were provided.
    #[error("Invalid global options provided. {0}")]
    InvalidOptions(String),

    /// No matching title in the archive database.
    #[error("Could not find the title in the Flashpoint database.")]
    TitleNotFound,

    /// More search results than can be presented.
    #[error("More results than can be presented were returned in a search.")]
    TooManyResults,

    /// The configured server is absent from the services store.
    #[error("The configured server was not found within the Flashpoint services store: {0}")]
    ConfiguredServerMissing(String),

    /// Unrecognized data pack parameters, the title likely won't work.
    #[error("Unrecognized datapack parameters were present: {0}")]
    UnknownDatapackParam(String),

    /// The data pack could not be obtained by any edition-appropriate means.
    #[error("The specified datapack could not be obtained: {0}")]
    CannotObtainDatapack(String),
}

impl CoreError {
    pub const BLOCK: u32 = 1200;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::CompanionModeLauncherClose => 1,
            Self::CompanionModeServerOverride => 2,
            Self::InvalidOptions(_) => 3,
            Self::TitleNotFound => 4,
            Self::TooManyResults => 5,
            Self::ConfiguredServerMissing(_) => 6,
            Self::UnknownDatapackParam(_) => 7,
            Self::CannotObtainDatapack(_) => 8,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownDatapackParam(_) => Severity::Warning,
            _ => Severity::Critical,
        }
    }
}

/// Errors related to archive database operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Database connection could not be established.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be interpreted.
    #[error("Malformed row value: {0}")]
    MalformedRow(String),
}

impl DatabaseError {
    pub const BLOCK: u32 = 1203;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::ConnectionFailed(_) => 1,
            Self::QueryFailed(_) => 2,
            Self::MalformedRow(_) => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors from the director itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectorError {
    #[error("Internal error. {0}")]
    InternalError(String),
}

impl DirectorError {
    pub const BLOCK: u32 = 1201;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors from run setup and queue processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Another instance already holds the single-instance lock.
    #[error("Only one instance of CLIFp can be used at a time!")]
    AlreadyOpen,

    /// The binary is not deployed inside a recognizable archive install.
    #[error("CLIFp does not appear to be deployed in a valid Flashpoint install. {0}")]
    InvalidInstall(String),
}

impl DriverError {
    pub const BLOCK: u32 = 1202;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::AlreadyOpen => 1,
            Self::InvalidInstall(_) => 2,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors shared by all subcommands during parsing and dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command arguments. {0}")]
    InvalidArguments(String),

    #[error("'{0}' is not a valid command")]
    InvalidCommand(String),

    #[error("Missing required options for '{0}': {1}")]
    MissingRequiredOption(String, String),
}

impl CommandError {
    pub const BLOCK: u32 = 1210;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::InvalidArguments(_) => 1,
            Self::InvalidCommand(_) => 2,
            Self::MissingRequiredOption(..) => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors shared by the title-resolving subcommands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TitleCommandError {
    /// The provided string was not a valid UUID.
    #[error("The provided string was not a valid GUID/UUID: {0}")]
    InvalidId(String),

    /// The provided random-selection filter is not recognized.
    #[error("The provided string for random operation was not a valid filter: {0}")]
    InvalidRandomFilter(String),

    /// No title was specified at all.
    #[error("No title was specified.")]
    MissingTitle,
}

impl TitleCommandError {
    pub const BLOCK: u32 = 1211;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::InvalidId(_) => 1,
            Self::InvalidRandomFilter(_) => 2,
            Self::MissingTitle => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors specific to `play`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error("The provided 'flashpoint://' scheme URL is invalid: {0}")]
    InvalidUrl(String),
}

impl PlayError {
    pub const BLOCK: u32 = 1212;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors specific to `link`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("The shortcut path is invalid: {0}")]
    InvalidPath(String),

    #[error("Failed to create the shortcut: {0}")]
    ShortcutCreationFailed(String),
}

impl LinkError {
    pub const BLOCK: u32 = 1213;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::InvalidPath(_) => 1,
            Self::ShortcutCreationFailed(_) => 2,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors specific to `share`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("Failed to register CLIFp as the 'flashpoint' scheme handler. {0}")]
    RegistrationFailed(String),

    #[error("Failed to remove CLIFp as the 'flashpoint' scheme handler. {0}")]
    UnregistrationFailed(String),
}

impl ShareError {
    pub const BLOCK: u32 = 1216;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::RegistrationFailed(_) => 1,
            Self::UnregistrationFailed(_) => 2,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors specific to `update`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Failed to query the update server. {0}")]
    ConnectionError(String),

    #[error("The update server responded with unrecognized data. {0}")]
    InvalidUpdateData(String),

    #[error("The latest release has an invalid version: {0}")]
    InvalidReleaseVersion(String),

    #[error("The old version is still running.")]
    OldProcessNotFinished,

    #[error("An update path is invalid: {0}")]
    InvalidPath(String),

    #[error("File transfer operation failed. {0}")]
    TransferFail(String),

    #[error("Failed to clear the update cache. {0}")]
    CacheClearFail(String),
}

impl UpdateError {
    pub const BLOCK: u32 = 1218;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::ConnectionError(_) => 1,
            Self::InvalidUpdateData(_) => 2,
            Self::InvalidReleaseVersion(_) => 3,
            Self::OldProcessNotFinished => 4,
            Self::InvalidPath(_) => 5,
            Self::TransferFail(_) => 6,
            Self::CacheClearFail(_) => 7,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Errors from the Ultimate-edition games archive accessor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("Data Pack could not be found in the archive: {0}")]
    PackNotFound(String),

    #[error("Data Pack from archive is corrupted: {0}")]
    PackCorrupt(String),

    #[error("Failed to read from the games archive. {0}")]
    ReadFailed(String),
}

impl ArchiveError {
    pub const BLOCK: u32 = 1230;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::PackNotFound(_) => 1,
            Self::PackCorrupt(_) => 2,
            Self::ReadFailed(_) => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Proxy mounter failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyMounterError {
    #[error("Failed to mount data pack via proxy server. {0}")]
    ProxyMount(String),
}

impl ProxyMounterError {
    pub const BLOCK: u32 = 1232;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// QMP mounter failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QmpMounterError {
    #[error("QMP connection error. {0}")]
    Connection(String),

    #[error("QMP communication error. {0}")]
    Communication(String),

    #[error("QMP command error. {0}")]
    Command(String),
}

impl QmpMounterError {
    pub const BLOCK: u32 = 1233;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::Connection(_) => 1,
            Self::Communication(_) => 2,
            Self::Command(_) => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Router mounter failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterMounterError {
    #[error("Failed to mount data pack via router. {0}")]
    Failed(String),
}

impl RouterMounterError {
    pub const BLOCK: u32 = 1234;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Process bider failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BiderError {
    #[error("Could not setup a wait on the process: {0}")]
    Wait(String),

    #[error("Could not close the wait on process: {0}")]
    Close(String),
}

impl BiderError {
    pub const BLOCK: u32 = 1235;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::Wait(_) => 1,
            Self::Close(_) => 2,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Close(_) => Severity::Warning,
            Self::Wait(_) => Severity::Critical,
        }
    }
}

/// Data pack download failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The streamed bytes' digest does not match the record. A later run can
    /// retry, so this is only a warning.
    #[error("The title's Data Pack checksum does not match its record!")]
    ChecksumMismatch,

    #[error("The download could not be completed. {0}")]
    Incomplete(String),
}

impl DownloadError {
    pub const BLOCK: u32 = 1250;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::ChecksumMismatch => 1,
            Self::Incomplete(_) => 2,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ChecksumMismatch => Severity::Warning,
            Self::Incomplete(_) => Severity::Critical,
        }
    }
}

/// Data pack extraction failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Failed to open the archive: {0}")]
    OpenArchive(String),

    #[error("Failed to create an extraction path: {0}")]
    MakePath(String),

    #[error("Failed to open a file within the archive: {0}")]
    OpenFile(String),

    #[error("Failed to write an extracted file: {0}")]
    WriteFile(String),

    #[error("Zip library error: {0}")]
    GeneralZip(String),
}

impl ExtractError {
    pub const BLOCK: u32 = 1251;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::OpenArchive(_) => 1,
            Self::MakePath(_) => 2,
            Self::OpenFile(_) => 3,
            Self::WriteFile(_) => 4,
            Self::GeneralZip(_) => 5,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Executable launch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Failed to start executable. {0}")]
    CouldNotStart(String),

    #[error("Failed to find executable: {0}")]
    CouldNotFind(String),

    #[error("Tried to start invalid executable: {0}")]
    NotValid(String),

    /// A Windows artefact needed the compatibility layer but it is absent.
    #[error("The Windows compatibility layer (wine) is not installed, cannot run: {0}")]
    CompatLayerMissing(String),
}

impl ExecError {
    pub const BLOCK: u32 = 1253;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::CouldNotStart(_) => 1,
            Self::CouldNotFind(_) => 2,
            Self::NotValid(_) => 3,
            Self::CompatLayerMissing(_) => 4,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// `show -e` extras folder failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtraError {
    #[error("The extra '{0}' does not exist!")]
    NotFound(String),
}

impl ExtraError {
    pub const BLOCK: u32 = 1255;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Bide task failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BideError {
    #[error("Could not bide on process: {0}")]
    BideFail(String),
}

impl BideError {
    pub const BLOCK: u32 = 1256;

    pub fn code(&self) -> u32 {
        Self::BLOCK * 100 + 1
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Docker readiness wait failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwaitDockerError {
    #[error("Failed to directly query docker image status. {0}")]
    DirectQueryFailed(String),

    #[error("Failed to start the docker event listener. {0}")]
    ListenFailed(String),

    #[error("The start of the docker image timed out: {0}")]
    StartFailed(String),
}

impl AwaitDockerError {
    pub const BLOCK: u32 = 1260;

    pub fn code(&self) -> u32 {
        let ordinal = match self {
            Self::DirectQueryFailed(_) => 1,
            Self::ListenFailed(_) => 2,
            Self::StartFailed(_) => 3,
        };
        Self::BLOCK * 100 + ordinal
    }

    pub fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Umbrella error for task and command results.
///
/// `Cancelled` is not a failure: it signals a user-initiated stop and never
/// sets the run's error status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClifpError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Director(#[from] DirectorError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    TitleCommand(#[from] TitleCommandError),
    #[error(transparent)]
    Play(#[from] PlayError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    ProxyMounter(#[from] ProxyMounterError),
    #[error(transparent)]
    QmpMounter(#[from] QmpMounterError),
    #[error(transparent)]
    RouterMounter(#[from] RouterMounterError),
    #[error(transparent)]
    Bider(#[from] BiderError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Extra(#[from] ExtraError),
    #[error(transparent)]
    Bide(#[from] BideError),
    #[error(transparent)]
    AwaitDocker(#[from] AwaitDockerError),

    /// User-initiated cancellation. Exits 0.
    #[error("Operation canceled.")]
    Cancelled,
}

impl ClifpError {
    pub fn code(&self) -> u32 {
        match self {
            Self::Core(e) => e.code(),
            Self::Database(e) => e.code(),
            Self::Director(e) => e.code(),
            Self::Driver(e) => e.code(),
            Self::Command(e) => e.code(),
            Self::TitleCommand(e) => e.code(),
            Self::Play(e) => e.code(),
            Self::Link(e) => e.code(),
            Self::Share(e) => e.code(),
            Self::Update(e) => e.code(),
            Self::Archive(e) => e.code(),
            Self::ProxyMounter(e) => e.code(),
            Self::QmpMounter(e) => e.code(),
            Self::RouterMounter(e) => e.code(),
            Self::Bider(e) => e.code(),
            Self::Download(e) => e.code(),
            Self::Extract(e) => e.code(),
            Self::Exec(e) => e.code(),
            Self::Extra(e) => e.code(),
            Self::Bide(e) => e.code(),
            Self::AwaitDocker(e) => e.code(),
            Self::Cancelled => 0,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Core(e) => e.severity(),
            Self::Database(e) => e.severity(),
            Self::Director(e) => e.severity(),
            Self::Driver(e) => e.severity(),
            Self::Command(e) => e.severity(),
            Self::TitleCommand(e) => e.severity(),
            Self::Play(e) => e.severity(),
            Self::Link(e) => e.severity(),
            Self::Share(e) => e.severity(),
            Self::Update(e) => e.severity(),
            Self::Archive(e) => e.severity(),
            Self::ProxyMounter(e) => e.severity(),
            Self::QmpMounter(e) => e.severity(),
            Self::RouterMounter(e) => e.severity(),
            Self::Bider(e) => e.severity(),
            Self::Download(e) => e.severity(),
            Self::Extract(e) => e.severity(),
            Self::Exec(e) => e.severity(),
            Self::Extra(e) => e.severity(),
            Self::Bide(e) => e.severity(),
            Self::AwaitDocker(e) => e.severity(),
            Self::Cancelled => Severity::Warning,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Flatten into the directive-friendly value form.
    pub fn details(&self) -> ErrorDetails {
        ErrorDetails::new(self.code(), self.severity(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::TitleNotFound;
        assert_eq!(
            err.to_string(),
            "Could not find the title in the Flashpoint database."
        );
    }

    #[test]
    fn test_core_error_codes_in_block() {
        assert_eq!(CoreError::CompanionModeLauncherClose.code(), 120001);
        assert_eq!(CoreError::CannotObtainDatapack("x".into()).code(), 120008);
    }

    #[test]
    fn test_unknown_datapack_param_is_warning() {
        assert_eq!(
            CoreError::UnknownDatapackParam("-weird".into()).severity(),
            Severity::Warning
        );
        assert_eq!(CoreError::TitleNotFound.severity(), Severity::Critical);
    }

    #[test]
    fn test_checksum_mismatch_is_warning() {
        assert_eq!(DownloadError::ChecksumMismatch.severity(), Severity::Warning);
        assert_eq!(
            DownloadError::Incomplete("timeout".into()).severity(),
            Severity::Critical
        );
    }

    #[test]
    fn test_title_command_random_filter_code() {
        let err = TitleCommandError::InvalidRandomFilter("nonsense".into());
        assert_eq!(err.code(), 121102);
        assert_eq!(err.severity(), Severity::Critical);
    }

    #[test]
    fn test_umbrella_delegates_code_and_severity() {
        let err: ClifpError = DownloadError::ChecksumMismatch.into();
        assert_eq!(err.code(), 125001);
        assert_eq!(err.severity(), Severity::Warning);
    }

    #[test]
    fn test_cancelled_is_not_a_failure() {
        let err = ClifpError::Cancelled;
        assert_eq!(err.code(), 0);
        assert!(err.is_cancellation());
        assert_eq!(err.severity(), Severity::Warning);
    }

    #[test]
    fn test_error_details_builder() {
        let details = ErrorDetails::new(120004, Severity::Critical, "Not found")
            .with_secondary("title 'x'")
            .with_details("query log");
        assert_eq!(details.code, 120004);
        assert_eq!(details.secondary.as_deref(), Some("title 'x'"));
        assert_eq!(details.details.as_deref(), Some("query log"));
        assert_eq!(details.to_string(), "[120004] Not found title 'x'");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_error_details_clone_eq() {
        let a = ErrorDetails::new(120201, Severity::Critical, "Only one instance");
        let b = a.clone();
        assert_eq!(a, b);
    }
}
