fn main() {
    // Node linker flags are only needed when the bindings are compiled in.
    if std::env::var_os("CARGO_FEATURE_NAPI").is_some() {
        napi_build::setup();
    }
}
