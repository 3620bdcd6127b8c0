fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    // A failed lookup leaves the version out of build metadata.
    if let Some(version) = rustc_version::version_meta()
        .ok()
        .map(|meta| meta.short_version_string)
    {
        println!("cargo:rustc-env=PDF_EVAL_RUSTC_VERSION={version}");
    }
}
