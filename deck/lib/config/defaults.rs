//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The environment suffix used when deck creates a container for an image entry.
pub const DEFAULT_ENV: &str = "dev";

/// The default branch templates are synced from.
pub const DEFAULT_TEMPLATE_BRANCH: &str = "main";

/// Seconds the engine waits for a container to stop before killing it.
pub const DEFAULT_STOP_TIMEOUT_SECS: u32 = 10;

/// The highest port the resolver will scan up to.
pub const MAX_PORT: u16 = 65535;

/// The base port used for port types without a dedicated base.
pub const DEFAULT_BASE_PORT: u16 = 5000;

/// Base ports per declared port type, scanned upward during auto-allocation.
pub const BASE_PORTS: &[(&str, u16)] = &[
    ("DEV_PORT", 5000),
    ("DEBUG_PORT", 9229),
    ("WEB_PORT", 8080),
    ("HTTPS_PORT", 8443),
    ("ANDROID_DEBUG_PORT", 5037),
];

/// The contents of a freshly initialized `.deck/config.json`.
pub const DEFAULT_CONFIG: &str = r#"{
  "engine": "auto",
  "template_repo": null
}
"#;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Suffixes recognized when correlating a resource with containers, in precedence order.
pub fn default_env_suffixes() -> Vec<String> {
    ["dev", "test", "prod", "production"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Suffixes marking a container as production.
pub fn default_production_suffixes() -> Vec<String> {
    ["prod", "production"].into_iter().map(String::from).collect()
}

/// Returns the base port for a declared port type.
pub fn base_port_for(port_type: &str) -> u16 {
    BASE_PORTS
        .iter()
        .find(|(name, _)| *name == port_type)
        .map(|(_, port)| *port)
        .unwrap_or(DEFAULT_BASE_PORT)
}
