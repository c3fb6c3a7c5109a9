/// Build version, overridable at compile time with `INKSTONE_VERSION`.
pub const VERSION: &str = match option_env!("INKSTONE_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
