use tonic_build::manual::{Builder, Method, MethodBuilder, Service};

fn method(name: &str, route: &str, input: &str, output: &str) -> MethodBuilder {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::{input}"))
        .output_type(format!("crate::{output}"))
        .codec_path("tonic::codec::ProstCodec")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    let service = Service::builder()
        .name("GreetService")
        .package("greet")
        .method(method("greet", "Greet", "GreetRequest", "GreetResponse").build())
        .method(
            method(
                "greet_many_times",
                "GreetManyTimes",
                "GreetManyTimesRequest",
                "GreetManyTimesResponse",
            )
            .server_streaming()
            .build(),
        )
        .method(
            method("long_greet", "LongGreet", "LongGreetRequest", "LongGreetResponse")
                .client_streaming()
                .build(),
        )
        .method(
            method(
                "greet_everyone",
                "GreetEveryone",
                "GreetEveryoneRequest",
                "GreetEveryoneResponse",
            )
            .client_streaming()
            .server_streaming()
            .build(),
        )
        .build();

    Builder::new().compile(&[service]);

    Ok(())
}
