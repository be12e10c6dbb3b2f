pub mod bugreport;
pub mod commands;
pub mod error;
pub mod settings;
pub mod version;

pub const VERSION_SUBCOMMAND: &str = "version";
pub const VERSION_DESCRIPTION: &str = "Display the version and build information";

pub const BUGREPORT_SUBCOMMAND: &str = "bugreport";
pub const BUGREPORT_DESCRIPTION: &str = "Collect information about the system and the environment that can be attached to a bug report";

pub const SIGNUP_SUBCOMMAND: &str = "signup";
pub const SIGNUP_DESCRIPTION: &str = "Register a new account. The account has to be confirmed by email before signing in";

pub const SIGNIN_SUBCOMMAND: &str = "signin";
pub const SIGNIN_DESCRIPTION: &str = "Sign in and remember the session for the next runs";

pub const SIGNOUT_SUBCOMMAND: &str = "signout";
pub const SIGNOUT_DESCRIPTION: &str = "Sign out and forget the remembered session";

pub const WHOAMI_SUBCOMMAND: &str = "whoami";
pub const WHOAMI_DESCRIPTION: &str = "Show the signed in account";

pub const LIST_SUBCOMMAND: &str = "list";
pub const LIST_DESCRIPTION: &str = "List stored PDF files";

pub const UPLOAD_SUBCOMMAND: &str = "upload";
pub const UPLOAD_DESCRIPTION: &str = "Upload a local PDF file (5 MB at most)";

pub const IMPORT_SUBCOMMAND: &str = "import";
pub const IMPORT_DESCRIPTION: &str = "Download a PDF from a URL and store it";

pub const RENAME_SUBCOMMAND: &str = "rename";
pub const RENAME_DESCRIPTION: &str = "Rename a stored file keeping its extension";

pub const DELETE_SUBCOMMAND: &str = "delete";
pub const DELETE_DESCRIPTION: &str = "Delete a stored file";

pub const STATS_SUBCOMMAND: &str = "stats";
pub const STATS_DESCRIPTION: &str = "Show storage usage statistics";
