use bugreport::{
    bugreport,
    collector::{CompileTimeInformation, EnvironmentVariables, OperatingSystem, SoftwareVersion},
    format::Markdown,
};

use super::settings::{BUCKET_ENV, SESSION_FILE_ENV, TIMEOUT_ENV, URL_ENV};

/// Prints the report. The anon key is left out on purpose.
pub fn run() {
    bugreport!()
        .info(SoftwareVersion::default())
        .info(OperatingSystem::default())
        .info(EnvironmentVariables::list(&[
            "SHELL",
            "TERM",
            "RUST_LOG",
            URL_ENV,
            BUCKET_ENV,
            SESSION_FILE_ENV,
            TIMEOUT_ENV,
        ]))
        .info(CompileTimeInformation::default())
        .print::<Markdown>();
}
