//! Compile time configurations for the util crate
fn main() {
    // the SUNRELAY_PKG_NAME variable is used to create local folders under
    // `~/.local/state` and other directories. Do not change the name
    // unless you know what you are doing as this means any stored channel
    // history will no longer be found by the service.
    println!("cargo::rustc-env=SUNRELAY_PKG_NAME=sunrelay");
}
