use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc unless the caller already points at one.
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("prediction_descriptor.bin"))
        .compile_protos(&["proto/prediction.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/prediction.proto");
    Ok(())
}
