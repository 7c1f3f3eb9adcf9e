fn main() {
    // Vendored protoc for reproducible builds
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("protoc");
    std::env::set_var("PROTOC", &protoc);

    println!("cargo:rerun-if-changed=proto/remote.proto");

    // Compile the remote-write wire messages
    let mut cfg = prost_build::Config::new();
    cfg.out_dir(std::env::var("OUT_DIR").unwrap());
    // Use local path (ensures file is inside published crate tarball)
    cfg.compile_protos(&["proto/remote.proto"], &["proto"]) // relative to CARGO_MANIFEST_DIR
        .expect("compile protos");
}
