use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("mspv2 {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: mspv2");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("MSPV2_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("MSPV2_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("protocol: MSPv2 (CRC-8/DVB-S2)");
    println!("features: link={}, cli=true", cfg!(feature = "link"));

    Ok(SUCCESS)
}
