//! Build script for compiling Protocol Buffer definitions.
//!
//! The generated code is placed in `$OUT_DIR` and included via `tonic::include_proto!`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=../../proto/ledger.proto");

    // Client stubs are used by the server's own end-to-end tests.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["../../proto/ledger.proto"], &["../../proto"])?;

    Ok(())
}
