// Build provenance reported by `signo version --extended`.
fn main() {
    for (source, exported) in [("TARGET", "SIGNO_BUILD_TARGET"), ("PROFILE", "SIGNO_BUILD_PROFILE")] {
        if let Ok(value) = std::env::var(source) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={source}");
    }
}
