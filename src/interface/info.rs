use crate::settings::engine::EngineConfig;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn git_branch() -> &'static str {
    option_env!("VERGEN_GIT_BRANCH").unwrap_or("unknown")
}

pub fn git_hash() -> &'static str {
    option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
}

pub fn build_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

pub fn build_config() -> &'static str {
    if cfg!(debug_assertions) { "Debug" } else { "Release" }
}

pub fn git_info() -> String {
    format!("{}/{}", git_branch(), git_hash())
}

pub fn build_info() -> String {
    format!("volstream {} {} {} {}", VERSION, build_config(), build_platform(), git_info())
}

/// Answers the host's system info queries. Unknown keys yield None.
pub fn system_info(key: &str, config: &EngineConfig) -> Option<String> {
    let value = match key {
        "VERSION" => VERSION.to_string(),
        "VERSION_MAJOR" => env!("CARGO_PKG_VERSION_MAJOR").to_string(),
        "VERSION_MINOR" => env!("CARGO_PKG_VERSION_MINOR").to_string(),
        "VERSION_REVISION" => env!("CARGO_PKG_VERSION_PATCH").to_string(),
        "BUILD_PLATFORM" => build_platform(),
        "BUILD_CONFIG" => build_config().to_string(),
        "BUILD_INFO" => build_info(),
        "GIT_BRANCH" => git_branch().to_string(),
        "GIT_HASH" => git_hash().to_string(),
        "GIT_INFO" => git_info(),
        "APP_ID" => config.app_id.clone(),
        "APP_VERSION" => config.app_version.clone(),
        "EXTENSION_PATH" => config.extension_path.clone(),
        _ => return None,
    };
    Some(value)
}
