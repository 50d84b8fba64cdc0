const UDL: &str = "src/patchlens_core.udl";

fn main() {
    println!("cargo:rerun-if-changed={UDL}");
    // build scripts run from the package root
    if let Err(err) = uniffi_build::generate_scaffolding_for_crate(UDL, "patchlens_core") {
        panic!("failed to generate UniFFI scaffolding from {UDL}: {err}");
    }
}
