/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` (field names map to upper-cased
/// env var names, serde defaults supply the documented fallbacks) and call
/// `Config::from_env()` at startup.
///
/// # Panics
///
/// Panics if a required env var is missing or a value cannot be parsed.
pub trait Config: Sized + serde::de::DeserializeOwned {
    fn from_env() -> Self {
        envy::from_env().expect("failed to load config from environment")
    }
}
