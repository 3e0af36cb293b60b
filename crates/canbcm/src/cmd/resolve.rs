use canbcm_transport::resolve;

use crate::cmd::ResolveArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_interface, OutputFormat};

pub fn run(_args: ResolveArgs, interface: &str, format: OutputFormat) -> CliResult<i32> {
    let index = resolve(interface).map_err(|err| transport_error("resolve failed", err))?;
    print_interface(interface, index.get(), format);
    Ok(SUCCESS)
}
