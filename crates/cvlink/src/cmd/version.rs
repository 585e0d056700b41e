use cvlink_transport::Endpoint;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cvlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cvlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("CVLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("CVLINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("wire_magic: 0x{:08X}", cvlink_frame::MAGIC);
    let mut transports = vec![Endpoint::tcp(0).transport_name()];
    if cfg!(unix) {
        transports.push(Endpoint::local_for_port(0).transport_name());
    }
    println!("transports: {}", transports.join(", "));
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
