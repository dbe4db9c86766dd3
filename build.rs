fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF toolchain environment is only needed for the device build;
    // host builds (unit + integration tests) skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
