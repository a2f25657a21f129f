fn main() {
    // Wire messages are declared by hand in src/transport/proto.rs; only the
    // service plumbing is generated, so no protoc is needed at build time.
    println!("cargo:rerun-if-changed=build.rs");

    let join = tonic_build::manual::Method::builder()
        .name("join")
        .route_name("Join")
        .input_type("crate::transport::proto::ClientMessage")
        .output_type("crate::transport::proto::ServerMessage")
        .codec_path("tonic::codec::ProstCodec")
        .client_streaming()
        .server_streaming()
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("FleetService")
        .package("fleet.transport")
        .method(join)
        .build();

    tonic_build::manual::Builder::new()
        .build_server(true)
        .build_client(true)
        .compile(&[service]);
}
