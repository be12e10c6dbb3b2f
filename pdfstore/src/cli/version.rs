use std::env;

use serde::{Deserialize, Serialize};

use super::settings::{BUCKET_ENV, URL_ENV};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionInfo {
    pub name: String,
    pub version: String,
    pub os: String,
    pub architecture: String,
    pub backend: String,
    pub bucket: String,
}

pub fn run() {
    let info = VersionInfo {
        name: clap::crate_name!().to_string(),
        version: clap::crate_version!().to_string(),
        os: env::consts::OS.to_string(),
        architecture: env::consts::ARCH.to_string(),
        backend: env::var(URL_ENV).unwrap_or_else(|_| String::from("<not configured>")),
        bucket: env::var(BUCKET_ENV).unwrap_or_else(|_| String::from(provider::DEFAULT_BUCKET)),
    };

    println!("Name           : {}", info.name);
    println!("Version        : {}", info.version);
    println!("OS             : {}", info.os);
    println!("Architecture   : {}", info.architecture);
    println!("Backend        : {}", info.backend);
    println!("Bucket         : {}", info.bucket);
}
