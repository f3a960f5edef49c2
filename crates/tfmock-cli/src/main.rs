use std::process::ExitCode;

fn main() -> ExitCode {
    tfmock_cli::run()
}
